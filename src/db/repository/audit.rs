//! Audit log repository — the pipeline event stream shown in the UI.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::AuditLevel;

use super::parse_timestamp;

/// One pipeline event.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub message: String,
    pub level: AuditLevel,
}

/// Append one event to the audit log.
pub fn log_event(
    conn: &Connection,
    source: &str,
    level: AuditLevel,
    message: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO audit_log (timestamp, source, message, level) VALUES (?1, ?2, ?3, ?4)",
        params![Utc::now().to_rfc3339(), source, message, level.as_str()],
    )?;
    Ok(())
}

/// Most recent events, newest first.
pub fn recent_entries(conn: &Connection, limit: u32) -> Result<Vec<AuditEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, timestamp, source, message, level
         FROM audit_log ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    rows.map(|r| {
        let (id, timestamp, source, message, level) = r.map_err(DatabaseError::from)?;
        Ok(AuditEntry {
            id,
            timestamp: parse_timestamp("audit_log.timestamp", &timestamp)?,
            source,
            message,
            level: AuditLevel::from_str(&level)?,
        })
    })
    .collect()
}

/// Wipe the audit log.
pub fn clear_audit_log(conn: &Connection) -> Result<usize, DatabaseError> {
    Ok(conn.execute("DELETE FROM audit_log", [])?)
}
