//! Trait definitions for the validation pipeline's collaborators.
//!
//! Four traits define the module boundaries:
//! - ExtractionClient: transport to the document-understanding service
//! - RegistryClient: transport to the authoritative registry
//! - ProviderStore: upsert-by-identifier persistence
//! - JobStore: durable job progress, readable by concurrent actors

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::provider::ProviderUpsert;
use crate::db::repository::validation::NewValidation;
use crate::db::repository::{job, provider, validation};
use crate::models::{JobStatus, JobStep, Provider, ValidationJob};

use super::error::PipelineError;
use super::types::DocumentPayload;

/// Transport to the extraction service. Returns the raw response body;
/// the gateway owns parsing and normalization.
pub trait ExtractionClient: Send + Sync {
    fn submit(&self, document: &DocumentPayload) -> Result<String, PipelineError>;
}

/// Transport to the authoritative registry. Returns the raw response body;
/// the gateway owns parsing and the not-found/error mapping.
pub trait RegistryClient: Send + Sync {
    fn fetch(&self, identifier: &str) -> Result<String, PipelineError>;
}

/// Upsert-by-identifier persistence of providers and their validations.
pub trait ProviderStore: Send + Sync {
    fn upsert_by_identifier(
        &self,
        conn: &Connection,
        record: &ProviderUpsert,
    ) -> Result<Uuid, PipelineError>;

    fn append_validation(
        &self,
        conn: &Connection,
        record: &NewValidation,
    ) -> Result<Uuid, PipelineError>;

    fn link_latest_validation(
        &self,
        conn: &Connection,
        provider_id: Uuid,
        validation_id: Uuid,
    ) -> Result<(), PipelineError>;

    fn find_by_identifier(
        &self,
        conn: &Connection,
        identifier: &str,
    ) -> Result<Option<Provider>, PipelineError>;
}

/// Durable lifecycle state of one validation run.
///
/// `is_cancelled` must re-read persisted state on every call — cancellation
/// is requested out-of-band by a concurrent actor, so a cached copy would
/// miss it.
pub trait JobStore: Send + Sync {
    fn create(&self, conn: &Connection, filename: &str) -> Result<ValidationJob, PipelineError>;

    fn advance_step(
        &self,
        conn: &Connection,
        job_id: Uuid,
        step: JobStep,
    ) -> Result<(), PipelineError>;

    fn set_total(&self, conn: &Connection, job_id: Uuid, total: u32) -> Result<(), PipelineError>;

    fn set_processed(
        &self,
        conn: &Connection,
        job_id: Uuid,
        processed: u32,
    ) -> Result<(), PipelineError>;

    fn is_cancelled(&self, conn: &Connection, job_id: Uuid) -> Result<bool, PipelineError>;

    fn complete(
        &self,
        conn: &Connection,
        job_id: Uuid,
        status: JobStatus,
        step: JobStep,
    ) -> Result<(), PipelineError>;
}

/// SQLite-backed provider store.
pub struct SqliteProviderStore;

impl ProviderStore for SqliteProviderStore {
    fn upsert_by_identifier(
        &self,
        conn: &Connection,
        record: &ProviderUpsert,
    ) -> Result<Uuid, PipelineError> {
        Ok(provider::upsert_by_identifier(conn, record)?)
    }

    fn append_validation(
        &self,
        conn: &Connection,
        record: &NewValidation,
    ) -> Result<Uuid, PipelineError> {
        Ok(validation::append_validation(conn, record)?)
    }

    fn link_latest_validation(
        &self,
        conn: &Connection,
        provider_id: Uuid,
        validation_id: Uuid,
    ) -> Result<(), PipelineError> {
        Ok(provider::set_latest_validation(conn, provider_id, validation_id)?)
    }

    fn find_by_identifier(
        &self,
        conn: &Connection,
        identifier: &str,
    ) -> Result<Option<Provider>, PipelineError> {
        Ok(provider::find_by_identifier(conn, identifier)?)
    }
}

/// SQLite-backed job store.
pub struct SqliteJobStore;

impl JobStore for SqliteJobStore {
    fn create(&self, conn: &Connection, filename: &str) -> Result<ValidationJob, PipelineError> {
        Ok(job::create_job(conn, filename)?)
    }

    fn advance_step(
        &self,
        conn: &Connection,
        job_id: Uuid,
        step: JobStep,
    ) -> Result<(), PipelineError> {
        Ok(job::advance_step(conn, job_id, step)?)
    }

    fn set_total(&self, conn: &Connection, job_id: Uuid, total: u32) -> Result<(), PipelineError> {
        Ok(job::set_total(conn, job_id, total)?)
    }

    fn set_processed(
        &self,
        conn: &Connection,
        job_id: Uuid,
        processed: u32,
    ) -> Result<(), PipelineError> {
        Ok(job::set_processed(conn, job_id, processed)?)
    }

    fn is_cancelled(&self, conn: &Connection, job_id: Uuid) -> Result<bool, PipelineError> {
        Ok(job::is_cancelled(conn, job_id)?)
    }

    fn complete(
        &self,
        conn: &Connection,
        job_id: Uuid,
        status: JobStatus,
        step: JobStep,
    ) -> Result<(), PipelineError> {
        Ok(job::complete_job(conn, job_id, status, step)?)
    }
}
