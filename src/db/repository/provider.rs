//! Provider repository — upsert-by-identifier persistence.
//!
//! The national provider identifier is the natural dedup key: a run that
//! re-encounters an identifier updates the existing row, never inserts a
//! second one. Providers without an identifier are always inserted fresh.

use std::str::FromStr;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{Provider, ProviderStatus};

use super::{parse_timestamp, parse_uuid};

/// Fields written on every upsert.
#[derive(Debug, Clone)]
pub struct ProviderUpsert {
    pub full_name: String,
    pub identifier: Option<String>,
    pub specialty: Option<String>,
    pub address: Option<String>,
    pub license: Option<String>,
    pub status: ProviderStatus,
    pub confidence_score: f64,
}

/// Aggregate counts for the registry dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryStats {
    pub total: u32,
    pub validated: u32,
    pub flagged: u32,
    pub avg_confidence: f64,
}

/// Insert or update a provider, keyed by identifier.
///
/// A single `ON CONFLICT` statement keeps concurrent upserts to the same
/// identifier from racing between a lookup and an insert; the loser of the
/// race updates the winner's row (last writer wins). Returns the id of the
/// row that now holds the record.
pub fn upsert_by_identifier(
    conn: &Connection,
    record: &ProviderUpsert,
) -> Result<Uuid, DatabaseError> {
    let now = Utc::now().to_rfc3339();
    let candidate_id = Uuid::new_v4();

    match &record.identifier {
        Some(identifier) => {
            conn.execute(
                "INSERT INTO providers
                   (id, full_name, identifier, specialty, address, license,
                    status, confidence_score, last_updated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(identifier) DO UPDATE SET
                    full_name = excluded.full_name,
                    specialty = excluded.specialty,
                    address = excluded.address,
                    license = excluded.license,
                    status = excluded.status,
                    confidence_score = excluded.confidence_score,
                    last_updated = excluded.last_updated",
                params![
                    candidate_id.to_string(),
                    record.full_name,
                    identifier,
                    record.specialty,
                    record.address,
                    record.license,
                    record.status.as_str(),
                    record.confidence_score,
                    now,
                ],
            )?;
            let stored = find_by_identifier(conn, identifier)?.ok_or_else(|| {
                DatabaseError::NotFound {
                    entity_type: "Provider".into(),
                    id: identifier.clone(),
                }
            })?;
            Ok(stored.id)
        }
        None => {
            conn.execute(
                "INSERT INTO providers
                   (id, full_name, specialty, address, license,
                    status, confidence_score, last_updated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    candidate_id.to_string(),
                    record.full_name,
                    record.specialty,
                    record.address,
                    record.license,
                    record.status.as_str(),
                    record.confidence_score,
                    now,
                ],
            )?;
            Ok(candidate_id)
        }
    }
}

pub fn find_by_identifier(
    conn: &Connection,
    identifier: &str,
) -> Result<Option<Provider>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, full_name, identifier, specialty, address, license,
                status, confidence_score, last_updated, latest_validation_id
         FROM providers WHERE identifier = ?1",
    )?;
    let row = stmt
        .query_row(params![identifier], provider_columns)
        .optional()?;
    row.map(provider_from_columns).transpose()
}

pub fn get_provider(conn: &Connection, id: Uuid) -> Result<Provider, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, full_name, identifier, specialty, address, license,
                status, confidence_score, last_updated, latest_validation_id
         FROM providers WHERE id = ?1",
    )?;
    let row = stmt
        .query_row(params![id.to_string()], provider_columns)
        .optional()?
        .ok_or_else(|| DatabaseError::NotFound {
            entity_type: "Provider".into(),
            id: id.to_string(),
        })?;
    provider_from_columns(row)
}

/// All providers, most recently updated first.
pub fn get_all_providers(conn: &Connection) -> Result<Vec<Provider>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, full_name, identifier, specialty, address, license,
                status, confidence_score, last_updated, latest_validation_id
         FROM providers ORDER BY last_updated DESC",
    )?;
    let rows = stmt.query_map([], provider_columns)?;
    rows.map(|r| r.map_err(DatabaseError::from).and_then(provider_from_columns))
        .collect()
}

/// Point the provider at its most recent validation record.
pub fn set_latest_validation(
    conn: &Connection,
    provider_id: Uuid,
    validation_id: Uuid,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE providers SET latest_validation_id = ?1 WHERE id = ?2",
        params![validation_id.to_string(), provider_id.to_string()],
    )?;
    Ok(())
}

/// Delete one provider; its validation records cascade.
pub fn delete_provider(conn: &Connection, id: Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM providers WHERE id = ?1",
        params![id.to_string()],
    )?;
    Ok(deleted > 0)
}

/// Delete every provider and, via cascade, every validation record.
pub fn clear_providers(conn: &Connection) -> Result<usize, DatabaseError> {
    Ok(conn.execute("DELETE FROM providers", [])?)
}

/// Dashboard aggregates over the whole provider registry.
pub fn registry_stats(conn: &Connection) -> Result<RegistryStats, DatabaseError> {
    conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(status = 'Validated'), 0),
                COALESCE(SUM(status = 'Flagged'), 0),
                COALESCE(AVG(confidence_score), 0.0)
         FROM providers",
        [],
        |row| {
            Ok(RegistryStats {
                total: row.get::<_, i64>(0)? as u32,
                validated: row.get::<_, i64>(1)? as u32,
                flagged: row.get::<_, i64>(2)? as u32,
                avg_confidence: row.get(3)?,
            })
        },
    )
    .map_err(DatabaseError::from)
}

/// Raw column tuple, split from parsing so query closures stay rusqlite-only.
type ProviderColumns = (
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
    f64,
    String,
    Option<String>,
);

fn provider_columns(row: &Row<'_>) -> rusqlite::Result<ProviderColumns> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
    ))
}

fn provider_from_columns(cols: ProviderColumns) -> Result<Provider, DatabaseError> {
    let (id, full_name, identifier, specialty, address, license, status, score, updated, latest) =
        cols;
    Ok(Provider {
        id: parse_uuid("providers.id", &id)?,
        full_name,
        identifier,
        specialty,
        address,
        license,
        status: ProviderStatus::from_str(&status)?,
        confidence_score: score,
        last_updated: parse_timestamp("providers.last_updated", &updated)?,
        latest_validation_id: latest
            .map(|v| parse_uuid("providers.latest_validation_id", &v))
            .transpose()?,
    })
}
