//! Extraction gateway — document bytes in, candidate records out.
//!
//! The extraction service does the actual document understanding; this
//! gateway owns the wire format and the output normalization. An extraction
//! failure aborts the whole run: without candidates there is nothing to
//! validate, and partial extraction output is not usable.

use base64::Engine as _;
use serde::Serialize;

use crate::models::ExtractionMode;

use super::error::PipelineError;
use super::traits::ExtractionClient;
use super::types::{CandidateRecord, DocumentPayload};

/// Wraps the extraction service behind normalization rules.
pub struct ExtractionGateway {
    client: Box<dyn ExtractionClient>,
}

impl ExtractionGateway {
    pub fn new(client: Box<dyn ExtractionClient>) -> Self {
        Self { client }
    }

    /// Extract candidate provider records from one document.
    ///
    /// `mode` is forwarded to the service verbatim: `single` asks for
    /// exactly one best candidate, `batch` for all found. The gateway never
    /// trims the list itself.
    pub fn extract(
        &self,
        content: &[u8],
        filename: &str,
        mode: ExtractionMode,
    ) -> Result<Vec<CandidateRecord>, PipelineError> {
        let document = DocumentPayload {
            filename: filename.to_string(),
            mime_type: mime_guess::from_path(filename)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
            mode,
            content: content.to_vec(),
        };

        let raw = self.client.submit(&document)?;
        let candidates = parse_candidates(&raw)?;

        tracing::debug!(
            filename,
            mode = mode.as_str(),
            candidates = candidates.len(),
            "Extraction complete"
        );
        Ok(candidates)
    }
}

/// Parse the service response into a normalized candidate list.
fn parse_candidates(raw: &str) -> Result<Vec<CandidateRecord>, PipelineError> {
    let clean = strip_code_fences(raw);
    let value: serde_json::Value = serde_json::from_str(clean)
        .map_err(|e| PipelineError::Extraction(format!("response was not valid JSON: {e}")))?;

    // A single object means one candidate; wrap it.
    let items = match value {
        serde_json::Value::Array(items) => items,
        object @ serde_json::Value::Object(_) => vec![object],
        other => {
            return Err(PipelineError::Extraction(format!(
                "response was neither a list nor an object: {other}"
            )))
        }
    };

    items
        .into_iter()
        .map(|item| {
            let mut candidate: CandidateRecord = serde_json::from_value(item).map_err(|e| {
                PipelineError::Extraction(format!("malformed candidate object: {e}"))
            })?;
            candidate.identifier = normalize_identifier(candidate.identifier.take());
            Ok(candidate)
        })
        .collect()
}

/// Some extraction models wrap their JSON in markdown fences.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

/// Identifiers must be all digits; anything else becomes None.
fn normalize_identifier(raw: Option<String>) -> Option<String> {
    let value = raw?.trim().to_string();
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        Some(value)
    } else {
        None
    }
}

// ═══════════════════════════════════════════════════════════
// HTTP client
// ═══════════════════════════════════════════════════════════

const DEFAULT_EXTRACTION_URL: &str = "http://localhost:8070";
const DEFAULT_EXTRACTION_TIMEOUT_SECS: u64 = 120;

/// HTTP transport to the extraction service.
pub struct HttpExtractionClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpExtractionClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        }
    }

    /// Configure from `VERITOR_EXTRACTION_URL`, with a local default.
    pub fn from_env() -> Self {
        let base_url = std::env::var("VERITOR_EXTRACTION_URL")
            .unwrap_or_else(|_| DEFAULT_EXTRACTION_URL.to_string());
        Self::new(&base_url, DEFAULT_EXTRACTION_TIMEOUT_SECS)
    }
}

/// Request body for the extraction service.
#[derive(Serialize)]
struct ExtractRequest<'a> {
    filename: &'a str,
    mime_type: &'a str,
    mode: &'a str,
    content: String,
}

impl ExtractionClient for HttpExtractionClient {
    fn submit(&self, document: &DocumentPayload) -> Result<String, PipelineError> {
        let url = format!("{}/v1/extract", self.base_url);
        let body = ExtractRequest {
            filename: &document.filename,
            mime_type: &document.mime_type,
            mode: document.mode.as_str(),
            content: base64::engine::general_purpose::STANDARD.encode(&document.content),
        };

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                PipelineError::Extraction(format!(
                    "cannot reach extraction service at {}",
                    self.base_url
                ))
            } else if e.is_timeout() {
                PipelineError::Extraction(format!(
                    "request timed out after {}s",
                    self.timeout_secs
                ))
            } else {
                PipelineError::Extraction(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            // Includes 429: blowing the service's rate limit is fatal to the run.
            let body = response.text().unwrap_or_default();
            return Err(PipelineError::Extraction(format!(
                "extraction service returned HTTP {status}: {body}"
            )));
        }

        response
            .text()
            .map_err(|e| PipelineError::Extraction(e.to_string()))
    }
}
