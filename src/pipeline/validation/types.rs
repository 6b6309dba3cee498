//! Core types for the validation pipeline.
//!
//! These model the full lifecycle of one candidate:
//! Extraction → Registry enrichment → Scoring → Persisted report.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::models::{EngineSettings, ExtractionMode, ProviderStatus};

// ═══════════════════════════════════════════
// Candidate Record (output of extraction)
// ═══════════════════════════════════════════

/// One provider as reported by the extraction service, not yet verified.
///
/// Field shape matches the extraction service wire format. Immutable once
/// produced — the exact struct is snapshotted into the validation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    /// May be empty or a placeholder; normalized by the runner before use.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub full_name: String,
    /// National provider identifier, digits only. Anything else becomes None.
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    /// Free-text caveats from the extraction service, carried into the snapshot.
    #[serde(default)]
    pub confidence_notes: Option<String>,
}

/// Extraction services emit `"full_name": null` for unreadable names.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// ═══════════════════════════════════════════
// Registry Record (output of enrichment)
// ═══════════════════════════════════════════

/// The authoritative counterpart of a candidate.
///
/// `found = false` is a first-class outcome, not an error: it means "no
/// authoritative match" and short-circuits scoring. A transport or parse
/// failure also yields `found = false`, with the cause preserved in
/// `error` for diagnostics only — scoring does not distinguish the two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryRecord {
    pub identifier_echo: Option<String>,
    pub official_name: Option<String>,
    pub specialty: Option<String>,
    pub organization_name: Option<String>,
    pub address: Option<String>,
    /// License number of the primary taxonomy entry, when the registry has one.
    pub license: Option<String>,
    pub status: String,
    pub found: bool,
    pub error: Option<String>,
}

impl RegistryRecord {
    /// A negative lookup result (missing identifier, or registry has no match).
    pub fn not_found(identifier: Option<&str>, status: &str) -> Self {
        Self {
            identifier_echo: identifier.map(String::from),
            official_name: None,
            specialty: None,
            organization_name: None,
            address: None,
            license: None,
            status: status.to_string(),
            found: false,
            error: None,
        }
    }

    /// A failed lookup, downgraded to "not found" with the cause attached.
    pub fn lookup_error(identifier: &str, error: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::not_found(Some(identifier), "Not Found")
        }
    }
}

// ═══════════════════════════════════════════
// Scoring output
// ═══════════════════════════════════════════

/// How much a single discrepancy matters, derived from its penalty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn from_penalty(penalty: f64) -> Self {
        if penalty >= 100.0 {
            Self::Critical
        } else if penalty >= 15.0 {
            Self::High
        } else if penalty >= 10.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// One detected field-level mismatch. Never deduplicated; order of
/// appearance is detection order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub field: String,
    pub penalty: f64,
    pub extracted_value: String,
    pub registry_value: String,
    pub reason: String,
    pub severity: Severity,
}

impl Discrepancy {
    pub fn new(
        field: &str,
        penalty: f64,
        extracted_value: &str,
        registry_value: &str,
        reason: &str,
    ) -> Self {
        Self {
            field: field.to_string(),
            penalty,
            extracted_value: extracted_value.to_string(),
            registry_value: registry_value.to_string(),
            reason: reason.to_string(),
            severity: Severity::from_penalty(penalty),
        }
    }
}

/// The scored comparison of one candidate against its registry record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationOutcome {
    /// 0-100. Penalty-only scoring: starts at 100, floors at 0.
    pub score: f64,
    pub status: ProviderStatus,
    pub discrepancies: Vec<Discrepancy>,
    pub summary: String,
}

// ═══════════════════════════════════════════
// Document payload (input to extraction)
// ═══════════════════════════════════════════

/// Raw document bytes plus the hints the extraction service needs.
#[derive(Debug, Clone)]
pub struct DocumentPayload {
    pub filename: String,
    pub mime_type: String,
    pub mode: ExtractionMode,
    pub content: Vec<u8>,
}

// ═══════════════════════════════════════════
// Engine configuration
// ═══════════════════════════════════════════

/// Resolved pipeline configuration.
///
/// `threshold_percent` lives on the 0-100 scale. The persisted settings
/// store a 0-1 fraction; `from_settings` is the single place where the
/// conversion happens.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub threshold_percent: f64,
    pub mode: ExtractionMode,
    /// Fixed delay between candidates. A required throttle toward the
    /// external services, not an optimization: exceeding their rate limit
    /// turns into a fatal error for the rest of the run.
    pub candidate_delay: Duration,
}

impl EngineConfig {
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self {
            threshold_percent: settings.confidence_threshold * 100.0,
            mode: settings.extraction_mode,
            candidate_delay: Duration::from_secs(1),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_settings(&EngineSettings::default())
    }
}
