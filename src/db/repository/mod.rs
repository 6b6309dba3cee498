pub mod provider;
pub mod validation;
pub mod job;
pub mod audit;
pub mod settings;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::DatabaseError;

/// Parse a stored RFC 3339 timestamp, flagging the column on corruption.
pub(crate) fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Corrupt {
            field: field.to_string(),
            reason: format!("{raw:?}: {e}"),
        })
}

/// Parse a stored UUID, flagging the column on corruption.
pub(crate) fn parse_uuid(field: &str, raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw).map_err(|e| DatabaseError::Corrupt {
        field: field.to_string(),
        reason: format!("{raw:?}: {e}"),
    })
}
