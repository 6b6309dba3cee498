//! Job tracker — one run's handle onto its durable progress row.
//!
//! Thin by design: every method goes straight to the store so progress is
//! durable and visible to concurrent pollers immediately. Nothing here
//! caches job state across a cancellation check.

use rusqlite::Connection;
use uuid::Uuid;

use crate::models::{JobStatus, JobStep};

use super::error::PipelineError;
use super::traits::JobStore;

pub struct JobTracker<'a> {
    store: &'a dyn JobStore,
    job_id: Uuid,
}

impl<'a> JobTracker<'a> {
    pub fn new(store: &'a dyn JobStore, job_id: Uuid) -> Self {
        Self { store, job_id }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn advance(&self, conn: &Connection, step: JobStep) -> Result<(), PipelineError> {
        tracing::debug!(job_id = %self.job_id, step = step.as_str(), "Job step");
        self.store.advance_step(conn, self.job_id, step)
    }

    pub fn set_total(&self, conn: &Connection, total: u32) -> Result<(), PipelineError> {
        self.store.set_total(conn, self.job_id, total)
    }

    pub fn set_processed(&self, conn: &Connection, processed: u32) -> Result<(), PipelineError> {
        self.store.set_processed(conn, self.job_id, processed)
    }

    /// Fresh read of the cancellation flag; cancellation arrives out-of-band.
    pub fn is_cancelled(&self, conn: &Connection) -> Result<bool, PipelineError> {
        self.store.is_cancelled(conn, self.job_id)
    }

    pub fn complete(
        &self,
        conn: &Connection,
        status: JobStatus,
        step: JobStep,
    ) -> Result<(), PipelineError> {
        self.store.complete(conn, self.job_id, status, step)
    }

    /// Mark the run failed (fatal-to-run error path).
    pub fn fail(&self, conn: &Connection) -> Result<(), PipelineError> {
        self.complete(conn, JobStatus::Error, JobStep::Failed)
    }
}
