use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::enums::ProviderStatus;

/// One immutable audit entry per validated candidate.
///
/// The snapshots hold the exact extracted record and registry record that
/// were scored, so a report can be reconstructed even after the provider
/// row has been overwritten by a later run. Rows are never updated.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationRecord {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub status: ProviderStatus,
    pub confidence_score: f64,
    pub discrepancies: serde_json::Value,
    pub extracted_snapshot: serde_json::Value,
    pub registry_snapshot: serde_json::Value,
}
