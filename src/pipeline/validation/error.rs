//! Pipeline-specific error types.
//!
//! The split mirrors the blast radius of each failure: `Extraction` aborts
//! the whole run, `RegistryLookup` degrades a single candidate to a
//! not-found record, and persistence problems skip one candidate's row.

use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Fatal to the run: without extraction output there is nothing to do.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Non-fatal: downstream scoring treats this as "no authoritative match".
    #[error("Registry lookup failed: {0}")]
    RegistryLookup(String),

    /// Fatal to one candidate's row.
    #[error("Database error: {0}")]
    Persistence(#[from] DatabaseError),

    #[error("JSON parsing error: {0}")]
    JsonParsing(String),
}
