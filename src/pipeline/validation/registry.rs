//! Registry gateway — authoritative lookups by provider identifier.
//!
//! Lookups never fail the pipeline: a missing identifier, an empty result
//! set, and a transport error all normalize to `found = false`, which the
//! scorer turns into an automatic flag. Only the diagnostics differ.

use serde::Deserialize;

use super::error::PipelineError;
use super::traits::RegistryClient;
use super::types::RegistryRecord;

/// Identifiers shorter than this are never sent to the registry: they
/// cannot be valid provider numbers, and every skipped call saves a
/// round-trip against a rate-limited public service.
pub const MIN_IDENTIFIER_LEN: usize = 5;

/// Wraps the registry service behind the not-found/error policy.
pub struct RegistryGateway {
    client: Box<dyn RegistryClient>,
}

impl RegistryGateway {
    pub fn new(client: Box<dyn RegistryClient>) -> Self {
        Self { client }
    }

    /// Look up one identifier, normalizing every outcome to a record.
    pub fn lookup(&self, identifier: Option<&str>) -> RegistryRecord {
        let trimmed = identifier.map(str::trim).filter(|s| !s.is_empty());
        let identifier = match trimmed {
            Some(id) if !id.eq_ignore_ascii_case("null") && id.len() >= MIN_IDENTIFIER_LEN => id,
            other => {
                tracing::debug!(
                    identifier = ?other,
                    "Skipping registry lookup: identifier missing or invalid"
                );
                return RegistryRecord::not_found(other, "Not Found (No identifier)");
            }
        };

        let body = match self.client.fetch(identifier) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(identifier, error = %e, "Registry lookup failed");
                return RegistryRecord::lookup_error(identifier, &e.to_string());
            }
        };

        match parse_registry_response(identifier, &body) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(identifier, error = %e, "Registry response unusable");
                RegistryRecord::lookup_error(identifier, &e.to_string())
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Response parsing
// ═══════════════════════════════════════════════════════════

#[derive(Deserialize)]
struct RegistryEnvelope {
    #[serde(default)]
    results: Vec<RegistryResult>,
}

#[derive(Deserialize, Default)]
struct RegistryResult {
    #[serde(default)]
    basic: RegistryBasic,
    #[serde(default)]
    addresses: Vec<RegistryAddress>,
    #[serde(default)]
    taxonomies: Vec<RegistryTaxonomy>,
}

#[derive(Deserialize, Default)]
struct RegistryBasic {
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    credential: String,
    #[serde(default)]
    organization_name: String,
    #[serde(default)]
    status: String,
}

#[derive(Deserialize, Default)]
struct RegistryAddress {
    #[serde(default)]
    address_purpose: String,
    #[serde(default)]
    address_1: String,
    #[serde(default)]
    address_2: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    postal_code: String,
}

#[derive(Deserialize, Default)]
struct RegistryTaxonomy {
    #[serde(default)]
    desc: String,
    #[serde(default)]
    license: String,
    #[serde(default)]
    primary: bool,
}

fn parse_registry_response(
    identifier: &str,
    body: &str,
) -> Result<RegistryRecord, PipelineError> {
    let envelope: RegistryEnvelope = serde_json::from_str(body).map_err(|e| {
        PipelineError::RegistryLookup(format!("registry response was not valid JSON: {e}"))
    })?;

    let Some(result) = envelope.results.into_iter().next() else {
        return Ok(RegistryRecord::not_found(Some(identifier), "Not Found"));
    };

    // The practice location is usually flagged LOCATION; fall back to the
    // first address the registry returns.
    let primary_address = result
        .addresses
        .iter()
        .find(|a| a.address_purpose.eq_ignore_ascii_case("LOCATION"))
        .or_else(|| result.addresses.first());
    let address = primary_address.map(format_address).filter(|a| !a.is_empty());

    let primary_taxonomy = result.taxonomies.iter().find(|t| t.primary);
    let specialty = primary_taxonomy
        .map(|t| t.desc.trim())
        .filter(|d| !d.is_empty())
        .unwrap_or("Unknown")
        .to_string();
    let license = primary_taxonomy
        .map(|t| t.license.trim().to_string())
        .filter(|l| !l.is_empty());

    let basic = result.basic;
    let person_name: Vec<&str> = [&basic.first_name, &basic.last_name, &basic.credential]
        .into_iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();
    let organization_name = Some(basic.organization_name.trim().to_string())
        .filter(|o| !o.is_empty());
    let official_name = if person_name.is_empty() {
        organization_name.clone()
    } else {
        Some(person_name.join(" "))
    };

    Ok(RegistryRecord {
        identifier_echo: Some(identifier.to_string()),
        official_name,
        specialty: Some(specialty),
        organization_name,
        address,
        license,
        status: basic.status,
        found: true,
        error: None,
    })
}

/// Comma-join the non-empty parts of an address.
fn format_address(addr: &RegistryAddress) -> String {
    [
        &addr.address_1,
        &addr.address_2,
        &addr.city,
        &addr.state,
        &addr.postal_code,
    ]
    .into_iter()
    .map(|p| p.trim())
    .filter(|p| !p.is_empty())
    .collect::<Vec<_>>()
    .join(", ")
}

// ═══════════════════════════════════════════════════════════
// HTTP client
// ═══════════════════════════════════════════════════════════

const DEFAULT_REGISTRY_URL: &str = "https://npiregistry.cms.hhs.gov/api/";
const DEFAULT_REGISTRY_TIMEOUT_SECS: u64 = 10;

/// HTTP transport to the NPI registry.
pub struct HttpRegistryClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpRegistryClient {
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

    /// Configure from `VERITOR_REGISTRY_URL`, defaulting to the CMS registry.
    pub fn from_env() -> Self {
        let base_url = std::env::var("VERITOR_REGISTRY_URL")
            .unwrap_or_else(|_| DEFAULT_REGISTRY_URL.to_string());
        Self::new(&base_url, DEFAULT_REGISTRY_TIMEOUT_SECS)
    }
}

impl RegistryClient for HttpRegistryClient {
    fn fetch(&self, identifier: &str) -> Result<String, PipelineError> {
        let url = format!("{}/?version=2.1&number={identifier}", self.base_url);

        let response = self.client.get(&url).send().map_err(|e| {
            if e.is_connect() {
                PipelineError::RegistryLookup(format!(
                    "cannot reach registry at {}",
                    self.base_url
                ))
            } else if e.is_timeout() {
                PipelineError::RegistryLookup(format!(
                    "request timed out after {}s",
                    self.timeout_secs
                ))
            } else {
                PipelineError::RegistryLookup(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::RegistryLookup(format!(
                "registry returned HTTP {status}"
            )));
        }

        response
            .text()
            .map_err(|e| PipelineError::RegistryLookup(e.to_string()))
    }
}
