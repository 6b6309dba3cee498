//! Provider Validation Pipeline
//!
//! Turns one uploaded document into zero or more persisted, scored
//! validation records:
//!
//! ```text
//! Extraction → (per candidate) Registry lookup → Scoring → Persistence
//! ```
//!
//! The job row is updated after each candidate and checked for cancellation
//! before each candidate begins. The document-understanding step and the
//! authoritative-registry lookup stay behind client traits; scoring is a
//! pure, deterministic rule evaluation — no model in the loop decides
//! whether two records match.

pub mod error;
pub mod types;
pub mod traits;
pub mod extraction;
pub mod registry;
pub mod score;
pub mod tracker;
pub mod runner;
pub mod background;

pub use error::PipelineError;
pub use types::*;
pub use traits::*;
pub use extraction::{ExtractionGateway, HttpExtractionClient};
pub use registry::{HttpRegistryClient, RegistryGateway, MIN_IDENTIFIER_LEN};
pub use tracker::JobTracker;
pub use runner::PipelineRunner;
pub use background::{request_cancel, spawn_validation};
