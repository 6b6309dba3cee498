//! PipelineRunner — orchestrates one document's validation run.
//!
//! Extraction → (per candidate) Registry lookup → Scoring → Persistence,
//! consulting the job store for cancellation before each candidate and
//! writing progress as it advances. Extraction failure is fatal to the
//! run; any other failure is confined to its candidate.

use std::thread;

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::audit;
use crate::db::repository::provider::ProviderUpsert;
use crate::db::repository::validation::NewValidation;
use crate::models::{AuditLevel, JobStatus, JobStep};

use super::error::PipelineError;
use super::extraction::ExtractionGateway;
use super::registry::RegistryGateway;
use super::score;
use super::tracker::JobTracker;
use super::traits::{JobStore, ProviderStore};
use super::types::{CandidateRecord, EngineConfig, ValidationOutcome};

pub struct PipelineRunner {
    extraction: ExtractionGateway,
    registry: RegistryGateway,
    config: EngineConfig,
}

impl PipelineRunner {
    pub fn new(
        extraction: ExtractionGateway,
        registry: RegistryGateway,
        config: EngineConfig,
    ) -> Self {
        Self {
            extraction,
            registry,
            config,
        }
    }

    /// Run the full pipeline for one document.
    ///
    /// Returns the outcomes of all candidates that made it through scoring
    /// and persistence. On cancellation the outcomes accumulated so far are
    /// returned; already-persisted rows stay persisted.
    pub fn run(
        &self,
        conn: &Connection,
        providers: &dyn ProviderStore,
        jobs: &dyn JobStore,
        content: &[u8],
        filename: &str,
        job_id: Uuid,
    ) -> Result<Vec<ValidationOutcome>, PipelineError> {
        let tracker = JobTracker::new(jobs, job_id);

        tracing::info!(job_id = %job_id, filename, "Starting validation workflow");
        record_audit(
            conn,
            "Pipeline",
            AuditLevel::Info,
            &format!("Starting validation workflow for {filename}"),
        );

        // Step 1: extraction. Fatal on failure — no partial data is persisted.
        tracker.advance(conn, JobStep::Extraction)?;
        let candidates = match self.extraction.extract(content, filename, self.config.mode) {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Extraction failed; aborting run");
                record_audit(conn, "Extraction", AuditLevel::Error, &e.to_string());
                tracker.fail(conn)?;
                return Err(e);
            }
        };

        let total = candidates.len();
        tracker.set_total(conn, total as u32)?;
        tracker.advance(conn, JobStep::Enrichment)?;
        record_audit(
            conn,
            "Extraction",
            AuditLevel::Success,
            &format!("Found {total} candidate providers"),
        );

        // Steps 2-3: per-candidate enrichment, scoring, persistence.
        let mut results = Vec::new();
        for (i, candidate) in candidates.into_iter().enumerate() {
            // Cooperative cancellation: only observed at this boundary, so
            // an in-flight external call always completes first.
            if tracker.is_cancelled(conn)? {
                tracing::warn!(job_id = %job_id, stopped_at = i, "Job cancelled");
                record_audit(
                    conn,
                    "Pipeline",
                    AuditLevel::Warn,
                    &format!("Job cancelled. Stopped after {i} of {total} candidates."),
                );
                return Ok(results);
            }

            let candidate = normalize_candidate_name(candidate);
            record_audit(
                conn,
                "Pipeline",
                AuditLevel::Info,
                &format!("[{}/{total}] Processing: {}", i + 1, candidate.full_name),
            );

            match self.process_candidate(conn, providers, &tracker, &candidate) {
                Ok(outcome) => results.push(outcome),
                Err(e) => {
                    // Fatal to this candidate only; the run continues.
                    tracing::warn!(
                        job_id = %job_id,
                        candidate = %candidate.full_name,
                        error = %e,
                        "Candidate failed, skipping"
                    );
                    record_audit(
                        conn,
                        "Pipeline",
                        AuditLevel::Error,
                        &format!("Candidate {} failed: {e}", i + 1),
                    );
                }
            }

            tracker.set_processed(conn, (i + 1) as u32)?;

            // Required throttle toward the external services.
            if i + 1 < total && !self.config.candidate_delay.is_zero() {
                thread::sleep(self.config.candidate_delay);
            }
        }

        tracker.complete(conn, JobStatus::Completed, JobStep::Complete)?;
        tracing::info!(job_id = %job_id, results = results.len(), total, "Workflow complete");
        record_audit(
            conn,
            "Pipeline",
            AuditLevel::Success,
            &format!(
                "Workflow complete. {} of {total} candidates produced reports.",
                results.len()
            ),
        );
        Ok(results)
    }

    fn process_candidate(
        &self,
        conn: &Connection,
        providers: &dyn ProviderStore,
        tracker: &JobTracker<'_>,
        candidate: &CandidateRecord,
    ) -> Result<ValidationOutcome, PipelineError> {
        let registry = self.registry.lookup(candidate.identifier.as_deref());

        let outcome = if !registry.found {
            // Outcome already determined; skip the full comparison.
            record_audit(
                conn,
                "Registry",
                AuditLevel::Warn,
                &format!(
                    "No authoritative match for {}; auto-flagging",
                    candidate.full_name
                ),
            );
            score::registry_miss_outcome(candidate)
        } else {
            tracker.advance(conn, JobStep::Qa)?;
            score::score(candidate, &registry, self.config.threshold_percent)
        };

        // Snapshots are taken from the exact records that were scored.
        let extracted_snapshot = to_snapshot(candidate)?;
        let registry_snapshot = to_snapshot(&registry)?;
        let discrepancies = to_snapshot(&outcome.discrepancies)?;

        let provider_id = providers.upsert_by_identifier(
            conn,
            &ProviderUpsert {
                full_name: candidate.full_name.clone(),
                identifier: candidate.identifier.clone(),
                specialty: candidate.specialty.clone(),
                address: candidate.address.clone(),
                license: candidate.license.clone(),
                status: outcome.status,
                confidence_score: outcome.score,
            },
        )?;

        let validation_id = providers.append_validation(
            conn,
            &NewValidation {
                provider_id,
                status: outcome.status,
                confidence_score: outcome.score,
                discrepancies,
                extracted_snapshot,
                registry_snapshot,
            },
        )?;
        providers.link_latest_validation(conn, provider_id, validation_id)?;

        record_audit(
            conn,
            "Pipeline",
            AuditLevel::Success,
            &format!(
                "Saved {} -> {} ({:.0}%)",
                candidate.full_name,
                outcome.status.as_str(),
                outcome.score
            ),
        );
        Ok(outcome)
    }
}

/// Substitute a stable placeholder for missing or junk extracted names.
fn normalize_candidate_name(mut candidate: CandidateRecord) -> CandidateRecord {
    let name = candidate.full_name.trim();
    let is_placeholder =
        name.is_empty() || matches!(name.to_lowercase().as_str(), "unknown" | "none" | "null");
    if is_placeholder {
        candidate.full_name = match &candidate.identifier {
            Some(identifier) => format!("Unknown Provider (NPI: {identifier})"),
            None => "Unknown Provider".to_string(),
        };
    }
    candidate
}

fn to_snapshot<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, PipelineError> {
    serde_json::to_value(value).map_err(|e| PipelineError::JsonParsing(e.to_string()))
}

/// Best-effort audit write; a broken audit log must not fail the run.
fn record_audit(conn: &Connection, source: &str, level: AuditLevel, message: &str) {
    if let Err(e) = audit::log_event(conn, source, level, message) {
        tracing::debug!(error = %e, "Audit log write failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::db::open_memory_database;
    use crate::db::repository::{job, provider, validation};
    use crate::models::{ExtractionMode, ProviderStatus, ValidationJob};
    use crate::pipeline::validation::traits::{
        ExtractionClient, RegistryClient, SqliteJobStore, SqliteProviderStore,
    };
    use crate::pipeline::validation::types::{DocumentPayload, RegistryRecord};

    // ── Stubs ───────────────────────────────────────────────

    struct CannedExtraction(Result<String, String>);

    impl ExtractionClient for CannedExtraction {
        fn submit(&self, _document: &DocumentPayload) -> Result<String, PipelineError> {
            match &self.0 {
                Ok(body) => Ok(body.clone()),
                Err(e) => Err(PipelineError::Extraction(e.clone())),
            }
        }
    }

    struct CountingRegistry {
        calls: Arc<AtomicU32>,
        body: Result<String, String>,
    }

    impl RegistryClient for CountingRegistry {
        fn fetch(&self, _identifier: &str) -> Result<String, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.body {
                Ok(body) => Ok(body.clone()),
                Err(e) => Err(PipelineError::RegistryLookup(e.clone())),
            }
        }
    }

    /// Job store that flips the cancellation flag once `processed` reaches
    /// the configured count, simulating an out-of-band user cancellation
    /// landing between candidates.
    struct CancelAfterStore {
        inner: SqliteJobStore,
        cancel_after: u32,
    }

    impl JobStore for CancelAfterStore {
        fn create(&self, conn: &Connection, filename: &str) -> Result<ValidationJob, PipelineError> {
            self.inner.create(conn, filename)
        }
        fn advance_step(
            &self,
            conn: &Connection,
            job_id: Uuid,
            step: JobStep,
        ) -> Result<(), PipelineError> {
            self.inner.advance_step(conn, job_id, step)
        }
        fn set_total(&self, conn: &Connection, job_id: Uuid, total: u32) -> Result<(), PipelineError> {
            self.inner.set_total(conn, job_id, total)
        }
        fn set_processed(
            &self,
            conn: &Connection,
            job_id: Uuid,
            processed: u32,
        ) -> Result<(), PipelineError> {
            self.inner.set_processed(conn, job_id, processed)?;
            if processed == self.cancel_after {
                job::request_cancel(conn, job_id)?;
            }
            Ok(())
        }
        fn is_cancelled(&self, conn: &Connection, job_id: Uuid) -> Result<bool, PipelineError> {
            self.inner.is_cancelled(conn, job_id)
        }
        fn complete(
            &self,
            conn: &Connection,
            job_id: Uuid,
            status: JobStatus,
            step: JobStep,
        ) -> Result<(), PipelineError> {
            self.inner.complete(conn, job_id, status, step)
        }
    }

    /// Provider store that refuses to persist one specific identifier.
    struct FailingProviderStore {
        inner: SqliteProviderStore,
        poison_identifier: String,
    }

    impl ProviderStore for FailingProviderStore {
        fn upsert_by_identifier(
            &self,
            conn: &Connection,
            record: &ProviderUpsert,
        ) -> Result<Uuid, PipelineError> {
            if record.identifier.as_deref() == Some(self.poison_identifier.as_str()) {
                return Err(PipelineError::Persistence(
                    crate::db::DatabaseError::Corrupt {
                        field: "providers".into(),
                        reason: "disk full".into(),
                    },
                ));
            }
            self.inner.upsert_by_identifier(conn, record)
        }
        fn append_validation(
            &self,
            conn: &Connection,
            record: &NewValidation,
        ) -> Result<Uuid, PipelineError> {
            self.inner.append_validation(conn, record)
        }
        fn link_latest_validation(
            &self,
            conn: &Connection,
            provider_id: Uuid,
            validation_id: Uuid,
        ) -> Result<(), PipelineError> {
            self.inner.link_latest_validation(conn, provider_id, validation_id)
        }
        fn find_by_identifier(
            &self,
            conn: &Connection,
            identifier: &str,
        ) -> Result<Option<crate::models::Provider>, PipelineError> {
            self.inner.find_by_identifier(conn, identifier)
        }
    }

    // ── Fixtures ────────────────────────────────────────────

    /// Registry body whose normalized record matches `strange_candidate`.
    const STRANGE_REGISTRY: &str = r#"{"results": [{
        "basic": {"organization_name": "Dr. Stephen Strange", "status": "A"},
        "addresses": [{"address_purpose": "LOCATION", "address_1": "177A Bleecker St",
                       "city": "New York", "state": "NY", "postal_code": "10012"}],
        "taxonomies": [{"desc": "Neurological Surgery", "license": "NY-123456", "primary": true}]
    }]}"#;

    const STRANGE_CANDIDATE: &str = r#"{"full_name": "Dr. Stephen Strange",
        "identifier": "5566778899", "specialty": "Neurological Surgery",
        "address": "177A Bleecker St, New York, NY, 10012", "license": "NY-123456"}"#;

    fn test_config() -> EngineConfig {
        EngineConfig {
            threshold_percent: 78.0,
            mode: ExtractionMode::Batch,
            candidate_delay: Duration::ZERO,
        }
    }

    fn make_runner(
        extraction_body: &str,
        registry_body: Result<String, String>,
        calls: Arc<AtomicU32>,
    ) -> PipelineRunner {
        PipelineRunner::new(
            ExtractionGateway::new(Box::new(CannedExtraction(Ok(extraction_body.into())))),
            RegistryGateway::new(Box::new(CountingRegistry {
                calls,
                body: registry_body,
            })),
            test_config(),
        )
    }

    fn candidates_json(count: usize) -> String {
        let items: Vec<String> = (0..count)
            .map(|i| {
                format!(
                    r#"{{"full_name": "Dr. Number {i}", "identifier": "10000000{i:02}",
                        "specialty": "Radiology", "address": "1 Main St", "license": "L-{i}"}}"#
                )
            })
            .collect();
        format!("[{}]", items.join(","))
    }

    // ── Tests ───────────────────────────────────────────────

    #[test]
    fn full_match_is_validated_and_persisted() {
        let conn = open_memory_database().unwrap();
        let jobs = SqliteJobStore;
        let created = job::create_job(&conn, "roster.pdf").unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let runner = make_runner(
            &format!("[{STRANGE_CANDIDATE}]"),
            Ok(STRANGE_REGISTRY.into()),
            calls,
        );

        let results = runner
            .run(&conn, &SqliteProviderStore, &jobs, b"doc", "roster.pdf", created.id)
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score, 100.0);
        assert_eq!(results[0].status, ProviderStatus::Validated);

        let stored = provider::find_by_identifier(&conn, "5566778899")
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, ProviderStatus::Validated);
        assert_eq!(stored.confidence_score, 100.0);
        assert!(stored.latest_validation_id.is_some());

        let finished = job::get_job(&conn, created.id).unwrap();
        assert_eq!(finished.status, JobStatus::Completed);
        assert_eq!(finished.current_step, JobStep::Complete);
        assert_eq!(finished.total_providers, 1);
        assert_eq!(finished.processed_providers, 1);
    }

    #[test]
    fn extraction_failure_marks_job_failed_and_persists_nothing() {
        let conn = open_memory_database().unwrap();
        let jobs = SqliteJobStore;
        let created = job::create_job(&conn, "roster.pdf").unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let runner = PipelineRunner::new(
            ExtractionGateway::new(Box::new(CannedExtraction(Err("service down".into())))),
            RegistryGateway::new(Box::new(CountingRegistry {
                calls: calls.clone(),
                body: Ok("{}".into()),
            })),
            test_config(),
        );

        let err = runner.run(&conn, &SqliteProviderStore, &jobs, b"doc", "roster.pdf", created.id);
        assert!(matches!(err, Err(PipelineError::Extraction(_))));

        let failed = job::get_job(&conn, created.id).unwrap();
        assert_eq!(failed.status, JobStatus::Error);
        assert_eq!(failed.current_step, JobStep::Failed);
        assert!(provider::get_all_providers(&conn).unwrap().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn malformed_extraction_output_is_fatal() {
        let conn = open_memory_database().unwrap();
        let jobs = SqliteJobStore;
        let created = job::create_job(&conn, "roster.pdf").unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let runner = make_runner("not json at all", Ok("{}".into()), calls);

        let err = runner.run(&conn, &SqliteProviderStore, &jobs, b"doc", "roster.pdf", created.id);
        assert!(matches!(err, Err(PipelineError::Extraction(_))));
        assert_eq!(job::get_job(&conn, created.id).unwrap().status, JobStatus::Error);
    }

    #[test]
    fn cancellation_after_two_of_five_stops_the_run() {
        let conn = open_memory_database().unwrap();
        let created = job::create_job(&conn, "roster.pdf").unwrap();
        let jobs = CancelAfterStore {
            inner: SqliteJobStore,
            cancel_after: 2,
        };
        let calls = Arc::new(AtomicU32::new(0));
        let runner = make_runner(
            &candidates_json(5),
            Ok(r#"{"results": []}"#.into()),
            calls.clone(),
        );

        let results = runner
            .run(&conn, &SqliteProviderStore, &jobs, b"doc", "roster.pdf", created.id)
            .unwrap();

        // Exactly two outcomes; candidates 3-5 were never looked up.
        assert_eq!(results.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Already-persisted rows stay persisted, the job stays cancelled.
        assert_eq!(provider::get_all_providers(&conn).unwrap().len(), 2);
        let stored = job::get_job(&conn, created.id).unwrap();
        assert_eq!(stored.status, JobStatus::Cancelled);
        assert_eq!(stored.processed_providers, 2);
    }

    #[test]
    fn registry_outage_flags_candidates_without_aborting() {
        let conn = open_memory_database().unwrap();
        let jobs = SqliteJobStore;
        let created = job::create_job(&conn, "roster.pdf").unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let runner = make_runner(
            &candidates_json(2),
            Err("connection refused".into()),
            calls,
        );

        let results = runner
            .run(&conn, &SqliteProviderStore, &jobs, b"doc", "roster.pdf", created.id)
            .unwrap();

        assert_eq!(results.len(), 2);
        for outcome in &results {
            assert_eq!(outcome.score, 0.0);
            assert_eq!(outcome.status, ProviderStatus::Flagged);
            assert_eq!(outcome.discrepancies.len(), 1);
        }
        assert_eq!(job::get_job(&conn, created.id).unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn persistence_failure_skips_only_that_candidate() {
        let conn = open_memory_database().unwrap();
        let jobs = SqliteJobStore;
        let created = job::create_job(&conn, "roster.pdf").unwrap();
        let providers = FailingProviderStore {
            inner: SqliteProviderStore,
            poison_identifier: "1000000001".into(),
        };
        let calls = Arc::new(AtomicU32::new(0));
        let runner = make_runner(
            &candidates_json(3),
            Ok(r#"{"results": []}"#.into()),
            calls,
        );

        let results = runner
            .run(&conn, &providers, &jobs, b"doc", "roster.pdf", created.id)
            .unwrap();

        // One of three failed to persist: it is skipped, not fatal.
        assert_eq!(results.len(), 2);
        let finished = job::get_job(&conn, created.id).unwrap();
        assert_eq!(finished.status, JobStatus::Completed);
        assert_eq!(finished.processed_providers, 3);
        assert_eq!(provider::get_all_providers(&conn).unwrap().len(), 2);
    }

    #[test]
    fn snapshots_equal_the_records_that_were_scored() {
        let conn = open_memory_database().unwrap();
        let jobs = SqliteJobStore;
        let created = job::create_job(&conn, "roster.pdf").unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let runner = make_runner(
            &format!("[{STRANGE_CANDIDATE}]"),
            Ok(r#"{"results": []}"#.into()),
            calls,
        );

        runner
            .run(&conn, &SqliteProviderStore, &jobs, b"doc", "roster.pdf", created.id)
            .unwrap();

        let stored = provider::find_by_identifier(&conn, "5566778899")
            .unwrap()
            .unwrap();
        let record =
            validation::get_validation(&conn, stored.latest_validation_id.unwrap()).unwrap();

        let expected_candidate: CandidateRecord =
            serde_json::from_str(STRANGE_CANDIDATE).unwrap();
        let expected_registry = RegistryRecord::not_found(Some("5566778899"), "Not Found");

        assert_eq!(
            record.extracted_snapshot,
            serde_json::to_value(&expected_candidate).unwrap()
        );
        assert_eq!(
            record.registry_snapshot,
            serde_json::to_value(&expected_registry).unwrap()
        );
    }

    #[test]
    fn placeholder_names_are_substituted() {
        let conn = open_memory_database().unwrap();
        let jobs = SqliteJobStore;
        let created = job::create_job(&conn, "roster.pdf").unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let runner = make_runner(
            r#"[{"full_name": "unknown", "identifier": "1234567890"},
                {"full_name": null}]"#,
            Ok(r#"{"results": []}"#.into()),
            calls,
        );

        runner
            .run(&conn, &SqliteProviderStore, &jobs, b"doc", "roster.pdf", created.id)
            .unwrap();

        let all = provider::get_all_providers(&conn).unwrap();
        let names: Vec<&str> = all.iter().map(|p| p.full_name.as_str()).collect();
        assert!(names.contains(&"Unknown Provider (NPI: 1234567890)"));
        assert!(names.contains(&"Unknown Provider"));
    }

    #[test]
    fn rerunning_the_same_document_upserts_not_duplicates() {
        let conn = open_memory_database().unwrap();
        let jobs = SqliteJobStore;
        let calls = Arc::new(AtomicU32::new(0));
        let runner = make_runner(
            &format!("[{STRANGE_CANDIDATE}]"),
            Ok(STRANGE_REGISTRY.into()),
            calls,
        );

        for _ in 0..2 {
            let created = job::create_job(&conn, "roster.pdf").unwrap();
            runner
                .run(&conn, &SqliteProviderStore, &jobs, b"doc", "roster.pdf", created.id)
                .unwrap();
        }

        let all = provider::get_all_providers(&conn).unwrap();
        assert_eq!(all.len(), 1);

        // latest_validation_id points at the newest of the two records.
        let history = validation::validations_for_provider(&conn, all[0].id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(all[0].latest_validation_id, Some(history[0].id));
    }

    #[test]
    fn candidates_without_identifiers_are_flagged_without_lookups() {
        let conn = open_memory_database().unwrap();
        let jobs = SqliteJobStore;
        let created = job::create_job(&conn, "roster.pdf").unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let runner = make_runner(
            r#"[{"full_name": "Dr. No Id", "identifier": "123"}]"#,
            Ok(STRANGE_REGISTRY.into()),
            calls.clone(),
        );

        let results = runner
            .run(&conn, &SqliteProviderStore, &jobs, b"doc", "roster.pdf", created.id)
            .unwrap();

        // "123" is numeric but too short: the gateway skip rule fires and
        // the registry client must never be invoked.
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(results[0].score, 0.0);
        assert_eq!(results[0].status, ProviderStatus::Flagged);
    }
}
