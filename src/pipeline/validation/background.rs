//! Detached validation runs — fire-and-forget per submitted document.
//!
//! The triggering caller gets a job id back immediately; the pipeline
//! continues on its own thread with its own database connection. Multiple
//! jobs may run concurrently; they share nothing but the database file.
//! All failure visibility is through the job row and the audit log.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::{audit, job};
use crate::db::sqlite::open_database;
use crate::models::AuditLevel;

use super::error::PipelineError;
use super::runner::PipelineRunner;
use super::traits::{JobStore, SqliteJobStore, SqliteProviderStore};

/// Create the job row and launch the pipeline on a background thread.
///
/// Returns the job id as soon as the row exists. The spawned run opens its
/// own connection against `db_path`, so progress writes and cancellation
/// reads go through the shared database, not through this process's memory.
pub fn spawn_validation(
    db_path: &Path,
    runner: Arc<PipelineRunner>,
    content: Vec<u8>,
    filename: String,
) -> Result<Uuid, PipelineError> {
    let conn = open_database(db_path)?;
    let job = SqliteJobStore.create(&conn, &filename)?;
    let job_id = job.id;

    let path: PathBuf = db_path.to_path_buf();
    std::thread::spawn(move || {
        let conn = match open_database(&path) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Cannot open database for run");
                return;
            }
        };

        match runner.run(
            &conn,
            &SqliteProviderStore,
            &SqliteJobStore,
            &content,
            &filename,
            job_id,
        ) {
            Ok(results) => {
                tracing::info!(job_id = %job_id, results = results.len(), "Validation run finished");
            }
            Err(e) => {
                // Job row already reflects the failure; nothing propagates
                // to the caller of spawn_validation.
                tracing::error!(job_id = %job_id, error = %e, "Validation run failed");
            }
        }
    });

    Ok(job_id)
}

/// Cancel a running job from a concurrent control path.
///
/// Takes effect at the pipeline's next per-candidate boundary. Returns true
/// if the job was still running, false if it had already finished.
pub fn request_cancel(conn: &Connection, job_id: Uuid) -> Result<bool, PipelineError> {
    let cancelled = job::request_cancel(conn, job_id)?;
    if cancelled {
        let stored = job::get_job(conn, job_id)?;
        tracing::warn!(job_id = %job_id, filename = %stored.filename, "Validation cancelled by user");
        audit::log_event(
            conn,
            "System",
            AuditLevel::Warn,
            &format!("Validation cancelled by user for {}", stored.filename),
        )?;
    }
    Ok(cancelled)
}
