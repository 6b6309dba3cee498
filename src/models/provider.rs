use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::enums::ProviderStatus;

/// A persisted provider, keyed by national provider identifier when present.
///
/// `identifier` is unique across all rows when non-null; re-validating a
/// document that mentions the same identifier updates this row in place.
#[derive(Debug, Clone, Serialize)]
pub struct Provider {
    pub id: Uuid,
    pub full_name: String,
    pub identifier: Option<String>,
    pub specialty: Option<String>,
    pub address: Option<String>,
    pub license: Option<String>,
    pub status: ProviderStatus,
    pub confidence_score: f64,
    pub last_updated: DateTime<Utc>,
    pub latest_validation_id: Option<Uuid>,
}
