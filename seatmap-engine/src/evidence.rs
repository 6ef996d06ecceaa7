//! Evidence arena entries and their per-pass outcomes
//!
//! Each entry is written by the orchestrator exactly once per pass, after the
//! pass barrier. Matching and resolution only ever read it.

use crate::recognition::{DetailPayload, IdentityPayload};
use serde::Serialize;
use std::fmt;

/// One screenshot handed to the engine
#[derive(Debug, Clone)]
pub struct EvidenceImage {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl EvidenceImage {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}

/// Why an evidence was excluded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    /// Identity pass failed on both attempts
    IdentityFailed,
    /// No record matched by identifier or by fallback score
    NoCandidate,
    /// Detail pass failed; the matched record stays matched
    DetailFailed,
    /// Every candidate failed a validation gate
    ValidationFailed,
    /// Every candidate produced an unusable seat mapping
    MappingRejected,
}

impl DiscardReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IdentityFailed => "identity_failed",
            Self::NoCandidate => "no_candidate",
            Self::DetailFailed => "detail_failed",
            Self::ValidationFailed => "validation_failed",
            Self::MappingRejected => "mapping_rejected",
        }
    }
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one evidence through the job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EvidenceStatus {
    Pending,
    /// Identity pass succeeded
    Identified,
    /// At least one record candidate proposed; eligible for the detail pass
    Matched,
    /// Candidate passed every gate and produced a seat mapping
    Confirmed { record: usize },
    Discarded { reason: DiscardReason },
}

/// Terminal identity-pass outcome
#[derive(Debug, Clone)]
pub struct IdentityOutcome {
    /// Validated payload when the pass succeeded
    pub payload: Option<IdentityPayload>,
    /// Reason of the last failed attempt
    pub error: Option<String>,
    /// Attempts made, 1 or 2
    pub attempts: u32,
}

impl IdentityOutcome {
    pub fn success(&self) -> bool {
        self.payload.is_some()
    }

    pub fn retry_count(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }

    pub fn identifier(&self) -> Option<&str> {
        self.payload.as_ref().and_then(|p| p.identifier.as_deref())
    }
}

/// Terminal detail-pass outcome
#[derive(Debug, Clone)]
pub struct DetailOutcome {
    pub payload: Option<DetailPayload>,
    pub error: Option<String>,
}

impl DetailOutcome {
    pub fn success(&self) -> bool {
        self.payload.is_some()
    }
}

/// Arena entry for one screenshot
#[derive(Debug, Clone)]
pub struct Evidence {
    pub filename: String,
    pub identity: Option<IdentityOutcome>,
    pub detail: Option<DetailOutcome>,
    pub status: EvidenceStatus,
}

impl Evidence {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            identity: None,
            detail: None,
            status: EvidenceStatus::Pending,
        }
    }

    pub fn discard(&mut self, reason: DiscardReason) {
        self.status = EvidenceStatus::Discarded { reason };
    }

    pub fn discard_reason(&self) -> Option<DiscardReason> {
        match self.status {
            EvidenceStatus::Discarded { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn identity_payload(&self) -> Option<&IdentityPayload> {
        self.identity.as_ref().and_then(|o| o.payload.as_ref())
    }

    pub fn detail_payload(&self) -> Option<&DetailPayload> {
        self.detail.as_ref().and_then(|o| o.payload.as_ref())
    }
}
