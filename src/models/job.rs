use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::enums::{JobStatus, JobStep};

/// Progress row for one validation run, polled by concurrent actors.
///
/// Created when a document is submitted, mutated by the pipeline as it
/// advances, terminal once `status` leaves `Running`.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationJob {
    pub id: Uuid,
    pub filename: String,
    pub status: JobStatus,
    pub total_providers: u32,
    pub processed_providers: u32,
    pub current_step: JobStep,
    pub created_at: DateTime<Utc>,
}
