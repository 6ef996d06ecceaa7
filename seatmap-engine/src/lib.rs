//! # seatmap-engine
//!
//! Evidence-to-record matching and seat-mapping resolution.
//!
//! Reconciles structured hand records (anonymized participant identifiers)
//! with screenshots read by an external recognition service (real, noisy
//! names) into one identifier → name mapping per table. A wrong mapping is
//! worse than no mapping: every candidate is gated, every conflict is
//! reported, nothing is guessed.
//!
//! ```rust,ignore
//! use seatmap_engine::{EngineConfig, HttpRecognizer, MappingJob, MappingOrchestrator};
//! use std::sync::Arc;
//!
//! let config = EngineConfig::from_toml(&toml_config)?;
//! let recognizer = Arc::new(HttpRecognizer::new(&config.recognition)?);
//! let orchestrator = MappingOrchestrator::new(recognizer, config)?;
//!
//! let output = orchestrator.run(MappingJob { records, evidence, tier }).await?;
//! for (table, names) in output.name_maps() {
//!     println!("{}: {:?}", table, names);
//! }
//! ```

pub mod aggregator;
pub mod config;
pub mod error;
pub mod evidence;
pub mod matching;
pub mod normalizer;
pub mod orchestrator;
pub mod recognition;
pub mod report;
pub mod resolver;
pub mod types;

pub use aggregator::{MergeConflict, TableAggregator, TableMapping, TableReport, TableStatus};
pub use config::{CallerTier, EngineConfig};
pub use error::{EngineError, EngineResult};
pub use evidence::{DiscardReason, EvidenceImage, EvidenceStatus};
pub use matching::{CandidateMatcher, MatchCandidate, MatchStrategy};
pub use normalizer::{identifiers_match, normalize};
pub use orchestrator::{MappingJob, MappingOrchestrator};
pub use recognition::{
    DetailPayload, DetailResult, HttpRecognizer, IdentityPayload, IdentityResult, RecognitionError,
    Recognizer,
};
pub use report::{EngineOutput, RecordStatus};
pub use resolver::{rotate_seat, MappingRejection, SeatMapResolver};
pub use types::{Record, Seat, SeatMapping, TableIdentity, SELF_MARKER};

/// Parsing collaborator: turns raw hand-history text into records
///
/// Implementations live outside this crate; the engine only consumes the
/// records they produce.
pub trait RecordSource: Send + Sync {
    fn parse(&self, text: &str) -> Vec<Record>;
}
