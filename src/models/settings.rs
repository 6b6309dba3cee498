use serde::Serialize;

use super::enums::ExtractionMode;

/// Persisted engine tunables (single row).
///
/// `confidence_threshold` is stored as a 0-1 fraction at this boundary.
/// The pipeline converts it to a 0-100 percentage exactly once, in
/// `EngineConfig::from_settings` — nothing else may scale it.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSettings {
    pub confidence_threshold: f64,
    pub extraction_mode: ExtractionMode,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.78,
            extraction_mode: ExtractionMode::Batch,
        }
    }
}
