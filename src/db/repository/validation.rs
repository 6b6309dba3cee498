//! Validation repository — append-only audit entries.

use std::str::FromStr;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{ProviderStatus, ValidationRecord};

use super::{parse_timestamp, parse_uuid};

/// Fields of a new validation entry. Snapshots are stored verbatim.
#[derive(Debug, Clone)]
pub struct NewValidation {
    pub provider_id: Uuid,
    pub status: ProviderStatus,
    pub confidence_score: f64,
    pub discrepancies: serde_json::Value,
    pub extracted_snapshot: serde_json::Value,
    pub registry_snapshot: serde_json::Value,
}

/// Append one validation record. Records are never updated afterwards.
pub fn append_validation(
    conn: &Connection,
    record: &NewValidation,
) -> Result<Uuid, DatabaseError> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO validations
           (id, provider_id, timestamp, status, confidence_score,
            discrepancies, extracted_snapshot, registry_snapshot)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id.to_string(),
            record.provider_id.to_string(),
            Utc::now().to_rfc3339(),
            record.status.as_str(),
            record.confidence_score,
            record.discrepancies.to_string(),
            record.extracted_snapshot.to_string(),
            record.registry_snapshot.to_string(),
        ],
    )?;
    Ok(id)
}

pub fn get_validation(conn: &Connection, id: Uuid) -> Result<ValidationRecord, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, provider_id, timestamp, status, confidence_score,
                discrepancies, extracted_snapshot, registry_snapshot
         FROM validations WHERE id = ?1",
    )?;
    let row = stmt
        .query_row(params![id.to_string()], validation_columns)
        .optional()?
        .ok_or_else(|| DatabaseError::NotFound {
            entity_type: "Validation".into(),
            id: id.to_string(),
        })?;
    validation_from_columns(row)
}

/// All validation records for one provider, newest first.
pub fn validations_for_provider(
    conn: &Connection,
    provider_id: Uuid,
) -> Result<Vec<ValidationRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, provider_id, timestamp, status, confidence_score,
                discrepancies, extracted_snapshot, registry_snapshot
         FROM validations WHERE provider_id = ?1 ORDER BY timestamp DESC, rowid DESC",
    )?;
    let rows = stmt.query_map(params![provider_id.to_string()], validation_columns)?;
    rows.map(|r| r.map_err(DatabaseError::from).and_then(validation_from_columns))
        .collect()
}

type ValidationColumns = (String, String, String, String, f64, String, String, String);

fn validation_columns(row: &Row<'_>) -> rusqlite::Result<ValidationColumns> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn validation_from_columns(cols: ValidationColumns) -> Result<ValidationRecord, DatabaseError> {
    let (id, provider_id, timestamp, status, score, discrepancies, extracted, registry) = cols;
    Ok(ValidationRecord {
        id: parse_uuid("validations.id", &id)?,
        provider_id: parse_uuid("validations.provider_id", &provider_id)?,
        timestamp: parse_timestamp("validations.timestamp", &timestamp)?,
        status: ProviderStatus::from_str(&status)?,
        confidence_score: score,
        discrepancies: parse_json("validations.discrepancies", &discrepancies)?,
        extracted_snapshot: parse_json("validations.extracted_snapshot", &extracted)?,
        registry_snapshot: parse_json("validations.registry_snapshot", &registry)?,
    })
}

fn parse_json(field: &str, raw: &str) -> Result<serde_json::Value, DatabaseError> {
    serde_json::from_str(raw).map_err(|e| DatabaseError::Corrupt {
        field: field.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::provider::{upsert_by_identifier, ProviderUpsert};
    use serde_json::json;

    fn seeded_provider(conn: &Connection) -> Uuid {
        upsert_by_identifier(
            conn,
            &ProviderUpsert {
                full_name: "Dr. Jane Foster".into(),
                identifier: Some("1234567890".into()),
                specialty: None,
                address: None,
                license: None,
                status: ProviderStatus::Pending,
                confidence_score: 0.0,
            },
        )
        .unwrap()
    }

    #[test]
    fn appended_record_round_trips() {
        let conn = open_memory_database().unwrap();
        let provider_id = seeded_provider(&conn);
        let record = NewValidation {
            provider_id,
            status: ProviderStatus::Flagged,
            confidence_score: 65.0,
            discrepancies: json!([{"field": "Full Name", "penalty": 20.0}]),
            extracted_snapshot: json!({"full_name": "Jane Foster"}),
            registry_snapshot: json!({"official_name": "Dr. Jane Foster", "found": true}),
        };

        let id = append_validation(&conn, &record).unwrap();
        let stored = get_validation(&conn, id).unwrap();

        assert_eq!(stored.provider_id, provider_id);
        assert_eq!(stored.status, ProviderStatus::Flagged);
        assert_eq!(stored.confidence_score, 65.0);
        assert_eq!(stored.discrepancies, record.discrepancies);
        assert_eq!(stored.extracted_snapshot, record.extracted_snapshot);
        assert_eq!(stored.registry_snapshot, record.registry_snapshot);
    }

    #[test]
    fn history_is_newest_first() {
        let conn = open_memory_database().unwrap();
        let provider_id = seeded_provider(&conn);
        for score in [10.0, 20.0] {
            append_validation(
                &conn,
                &NewValidation {
                    provider_id,
                    status: ProviderStatus::Flagged,
                    confidence_score: score,
                    discrepancies: json!([]),
                    extracted_snapshot: json!({}),
                    registry_snapshot: json!({}),
                },
            )
            .unwrap();
        }

        let history = validations_for_provider(&conn, provider_id).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].timestamp >= history[1].timestamp);
    }

    #[test]
    fn missing_validation_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = get_validation(&conn, Uuid::new_v4());
        assert!(matches!(err, Err(DatabaseError::NotFound { .. })));
    }
}
