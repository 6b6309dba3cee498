//! Job repository — progress rows for running validation pipelines.
//!
//! Every write is guarded by `status = 'running'`: once a job reaches a
//! terminal status, later transitions are silent no-ops. This tolerates the
//! race where a cancellation request and natural completion land
//! near-simultaneously. Cancellation checks always re-read the row, never
//! a cached copy, because cancellation arrives from a concurrent actor.

use std::str::FromStr;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{JobStatus, JobStep, ValidationJob};

use super::{parse_timestamp, parse_uuid};

/// Create a job row in `running`/`starting` state.
pub fn create_job(conn: &Connection, filename: &str) -> Result<ValidationJob, DatabaseError> {
    let job = ValidationJob {
        id: Uuid::new_v4(),
        filename: filename.to_string(),
        status: JobStatus::Running,
        total_providers: 0,
        processed_providers: 0,
        current_step: JobStep::Starting,
        created_at: Utc::now(),
    };
    conn.execute(
        "INSERT INTO validation_jobs
           (id, filename, status, total_providers, processed_providers, current_step, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            job.id.to_string(),
            job.filename,
            job.status.as_str(),
            job.total_providers,
            job.processed_providers,
            job.current_step.as_str(),
            job.created_at.to_rfc3339(),
        ],
    )?;
    Ok(job)
}

pub fn get_job(conn: &Connection, id: Uuid) -> Result<ValidationJob, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, filename, status, total_providers, processed_providers, current_step, created_at
         FROM validation_jobs WHERE id = ?1",
    )?;
    let row = stmt
        .query_row(params![id.to_string()], job_columns)
        .optional()?
        .ok_or_else(|| DatabaseError::NotFound {
            entity_type: "ValidationJob".into(),
            id: id.to_string(),
        })?;
    job_from_columns(row)
}

/// Most recent still-running job, if any.
pub fn active_job(conn: &Connection) -> Result<Option<ValidationJob>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, filename, status, total_providers, processed_providers, current_step, created_at
         FROM validation_jobs WHERE status = 'running' ORDER BY created_at DESC LIMIT 1",
    )?;
    let row = stmt.query_row([], job_columns).optional()?;
    row.map(job_from_columns).transpose()
}

/// Move a running job to the given step. No-op once terminal.
pub fn advance_step(conn: &Connection, id: Uuid, step: JobStep) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE validation_jobs SET current_step = ?1 WHERE id = ?2 AND status = 'running'",
        params![step.as_str(), id.to_string()],
    )?;
    Ok(())
}

/// Record how many candidates the run will process. No-op once terminal.
pub fn set_total(conn: &Connection, id: Uuid, total: u32) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE validation_jobs SET total_providers = ?1 WHERE id = ?2 AND status = 'running'",
        params![total, id.to_string()],
    )?;
    Ok(())
}

/// Record per-candidate progress. No-op once terminal.
pub fn set_processed(conn: &Connection, id: Uuid, processed: u32) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE validation_jobs SET processed_providers = ?1 WHERE id = ?2 AND status = 'running'",
        params![processed, id.to_string()],
    )?;
    Ok(())
}

/// Fresh read of the cancellation flag. Never served from memory.
pub fn is_cancelled(conn: &Connection, id: Uuid) -> Result<bool, DatabaseError> {
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM validation_jobs WHERE id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(matches!(status.as_deref(), Some("cancelled")))
}

/// Mark the job terminal. No-op if another actor got there first.
pub fn complete_job(
    conn: &Connection,
    id: Uuid,
    status: JobStatus,
    step: JobStep,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE validation_jobs SET status = ?1, current_step = ?2
         WHERE id = ?3 AND status = 'running'",
        params![status.as_str(), step.as_str(), id.to_string()],
    )?;
    Ok(())
}

/// Out-of-band cancellation request from a concurrent actor.
///
/// Returns true if the job was still running and is now cancelled; false
/// if it had already reached a terminal state.
pub fn request_cancel(conn: &Connection, id: Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE validation_jobs SET status = 'cancelled', current_step = 'cancelled'
         WHERE id = ?1 AND status = 'running'",
        params![id.to_string()],
    )?;
    Ok(changed > 0)
}

type JobColumns = (String, String, String, i64, i64, String, String);

fn job_columns(row: &Row<'_>) -> rusqlite::Result<JobColumns> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn job_from_columns(cols: JobColumns) -> Result<ValidationJob, DatabaseError> {
    let (id, filename, status, total, processed, step, created_at) = cols;
    Ok(ValidationJob {
        id: parse_uuid("validation_jobs.id", &id)?,
        filename,
        status: JobStatus::from_str(&status)?,
        total_providers: total as u32,
        processed_providers: processed as u32,
        current_step: JobStep::from_str(&step)?,
        created_at: parse_timestamp("validation_jobs.created_at", &created_at)?,
    })
}
