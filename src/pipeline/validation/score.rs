//! Deterministic confidence scoring — pure functions, no I/O.
//!
//! Penalty-only model: start at 100, subtract a fixed penalty per failed
//! check, floor at 0. Checks run in a fixed order so discrepancy lists are
//! reproducible across runs. Null fields on either side compare as empty
//! strings, not as automatic skips.

use crate::models::ProviderStatus;

use super::types::{CandidateRecord, Discrepancy, RegistryRecord, ValidationOutcome};

pub const NAME_MISMATCH_PENALTY: f64 = 20.0;
pub const SPECIALTY_MISMATCH_PENALTY: f64 = 10.0;
pub const SPECIALTY_PARTIAL_PENALTY: f64 = 5.0;
pub const ADDRESS_MISMATCH_PENALTY: f64 = 5.0;
pub const LICENSE_MISMATCH_PENALTY: f64 = 15.0;
pub const REGISTRY_MISS_PENALTY: f64 = 100.0;

/// Score one candidate against its registry record.
///
/// `threshold_percent` is on the 0-100 scale (converted from the stored
/// fraction exactly once, by `EngineConfig::from_settings`).
pub fn score(
    candidate: &CandidateRecord,
    registry: &RegistryRecord,
    threshold_percent: f64,
) -> ValidationOutcome {
    if !registry.found {
        return registry_miss_outcome(candidate);
    }

    let mut score = 100.0;
    let mut discrepancies = Vec::new();

    // 1. Name: case-insensitive exact compare.
    let extracted_name = candidate.full_name.trim();
    let official_name = text(&registry.official_name);
    if extracted_name.to_lowercase() != official_name.to_lowercase() {
        score -= NAME_MISMATCH_PENALTY;
        discrepancies.push(Discrepancy::new(
            "Full Name",
            NAME_MISMATCH_PENALTY,
            extracted_name,
            official_name,
            "Name does not match the registry's official name",
        ));
    }

    // 2. Specialty: substring containment, then exactness.
    let extracted_specialty = text(&candidate.specialty).to_lowercase();
    let official_specialty = text(&registry.specialty).to_lowercase();
    if !official_specialty.contains(&extracted_specialty) {
        score -= SPECIALTY_MISMATCH_PENALTY;
        discrepancies.push(Discrepancy::new(
            "Specialty",
            SPECIALTY_MISMATCH_PENALTY,
            text(&candidate.specialty),
            text(&registry.specialty),
            "Specialty total mismatch",
        ));
    } else if extracted_specialty != official_specialty {
        score -= SPECIALTY_PARTIAL_PENALTY;
        discrepancies.push(Discrepancy::new(
            "Specialty",
            SPECIALTY_PARTIAL_PENALTY,
            text(&candidate.specialty),
            text(&registry.specialty),
            "Extracted specialty is less specific than the registry taxonomy",
        ));
    }

    // 3. Address: normalized strings must agree.
    let extracted_address = text(&candidate.address).trim();
    let official_address = text(&registry.address).trim();
    if extracted_address != official_address {
        score -= ADDRESS_MISMATCH_PENALTY;
        discrepancies.push(Discrepancy::new(
            "Address",
            ADDRESS_MISMATCH_PENALTY,
            extracted_address,
            official_address,
            "Address format or detail differs from the registry",
        ));
    }

    // 4. License.
    let extracted_license = text(&candidate.license).trim();
    let official_license = text(&registry.license).trim();
    if extracted_license != official_license {
        score -= LICENSE_MISMATCH_PENALTY;
        discrepancies.push(Discrepancy::new(
            "License",
            LICENSE_MISMATCH_PENALTY,
            extracted_license,
            official_license,
            "License number mismatch",
        ));
    }

    let score = score.max(0.0);
    let status = if score >= threshold_percent {
        ProviderStatus::Validated
    } else {
        ProviderStatus::Flagged
    };

    let summary = if discrepancies.is_empty() {
        "All fields match the registry record.".to_string()
    } else {
        let fields: Vec<&str> = discrepancies.iter().map(|d| d.field.as_str()).collect();
        format!(
            "{} discrepancies ({}); final score {:.0}%",
            discrepancies.len(),
            fields.join(", "),
            score
        )
    };

    ValidationOutcome {
        score,
        status,
        discrepancies,
        summary,
    }
}

/// Short-circuit outcome when the registry has no authoritative match.
///
/// Exactly one synthesized discrepancy; no field comparison is performed.
pub fn registry_miss_outcome(candidate: &CandidateRecord) -> ValidationOutcome {
    let identifier = candidate.identifier.as_deref().unwrap_or("");
    ValidationOutcome {
        score: 0.0,
        status: ProviderStatus::Flagged,
        discrepancies: vec![Discrepancy::new(
            "Registry",
            REGISTRY_MISS_PENALTY,
            identifier,
            "Not Found",
            "Provider not found in authoritative registry",
        )],
        summary: "Automatic failure: provider not found in registry.".to_string(),
    }
}

fn text(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}
