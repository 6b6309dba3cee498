//! Veritor — provider record validation engine.
//!
//! Validates medical-provider records extracted from uploaded documents
//! against the authoritative NPI registry. One uploaded document becomes a
//! background validation job that extracts candidate records, enriches each
//! one with the registry's ground truth, scores the differences, and
//! persists a confidence-scored discrepancy report per provider.
//!
//! The embedding application (HTTP server, desktop shell) owns the outer
//! surface; this crate exposes the pipeline, its gateways, and the SQLite
//! persistence layer.

pub mod config;
pub mod models;
pub mod db;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

/// Initialize tracing for the embedding application.
///
/// Honors `RUST_LOG` when set, falling back to the crate default filter.
/// Call once at startup.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("Veritor starting v{}", config::APP_VERSION);
}
