//! Engine settings repository — single-row tunables.

use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::{EngineSettings, ExtractionMode};

/// Load settings, seeding the default row on first access.
pub fn load_or_default(conn: &Connection) -> Result<EngineSettings, DatabaseError> {
    let row: Option<(f64, String)> = conn
        .query_row(
            "SELECT confidence_threshold, extraction_mode FROM engine_settings WHERE id = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match row {
        Some((threshold, mode)) => Ok(EngineSettings {
            confidence_threshold: threshold,
            extraction_mode: ExtractionMode::from_str(&mode)?,
        }),
        None => {
            let defaults = EngineSettings::default();
            update(conn, &defaults)?;
            Ok(defaults)
        }
    }
}

/// Persist new settings values.
pub fn update(conn: &Connection, settings: &EngineSettings) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO engine_settings (id, confidence_threshold, extraction_mode)
         VALUES (1, ?1, ?2)
         ON CONFLICT(id) DO UPDATE SET
            confidence_threshold = excluded.confidence_threshold,
            extraction_mode = excluded.extraction_mode",
        params![settings.confidence_threshold, settings.extraction_mode.as_str()],
    )?;
    Ok(())
}
