//! Evidence-to-record candidate matching
//!
//! Two stages, split by the detail pass:
//!
//! 1. [`CandidateMatcher::propose`] runs right after the identity pass. Exact
//!    (normalized) identifier equality wins; otherwise every record is scored
//!    against the identity hints and those at or above the threshold become
//!    candidates, best score first.
//! 2. [`CandidateMatcher::confirm`] runs after the detail pass. Candidates are
//!    tried in order; the first one that passes every gate and resolves to a
//!    usable seat mapping is confirmed.

pub mod gates;
pub mod scoring;

pub use gates::{Gate, GateRejection};
pub use scoring::ScoreBreakdown;

use crate::normalizer::identifiers_match;
use crate::recognition::{DetailPayload, IdentityPayload};
use crate::resolver::{MappingRejection, SeatMapResolver};
use crate::types::{Record, ResolutionStrategy, SeatMapping};
use serde::Serialize;
use tracing::debug;

/// Default minimum fallback score
pub const DEFAULT_FALLBACK_THRESHOLD: u32 = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    IdentifierEquality,
    FallbackScore,
}

/// Proposed pairing of a record and an evidence, by arena index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchCandidate {
    pub record: usize,
    pub evidence: usize,
    pub strategy: MatchStrategy,
    /// Fallback breakdown; `None` for identifier matches
    pub breakdown: Option<ScoreBreakdown>,
}

impl MatchCandidate {
    pub fn score(&self) -> Option<u32> {
        self.breakdown.map(|b| b.total())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Proposal {
    /// Candidates in the order they should be tried
    Candidates(Vec<MatchCandidate>),
    /// Nothing matched; best fallback score seen, if any record was scored
    NoCandidate { best_score: Option<u32> },
}

/// Why a candidate was not confirmed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectionReason {
    Gate(GateRejection),
    Mapping(MappingRejection),
}

/// Result of trying every candidate of one evidence
#[derive(Debug, Clone, Default)]
pub struct Confirmation {
    /// Confirmed candidate and its seat mapping
    pub confirmed: Option<(MatchCandidate, SeatMapping)>,
    /// Candidates tried before the confirmed one (or all of them)
    pub rejected: Vec<(MatchCandidate, RejectionReason)>,
}

#[derive(Debug, Clone)]
pub struct CandidateMatcher {
    fallback_threshold: u32,
    resolver: SeatMapResolver,
}

impl Default for CandidateMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_THRESHOLD)
    }
}

impl CandidateMatcher {
    pub fn new(fallback_threshold: u32) -> Self {
        Self {
            fallback_threshold,
            resolver: SeatMapResolver::new(),
        }
    }

    pub fn fallback_threshold(&self) -> u32 {
        self.fallback_threshold
    }

    /// Propose record candidates for one identified evidence
    pub fn propose(
        &self,
        records: &[Record],
        evidence: usize,
        identity: &IdentityPayload,
    ) -> Proposal {
        if let Some(identifier) = identity.identifier.as_deref() {
            let exact: Vec<MatchCandidate> = records
                .iter()
                .enumerate()
                .filter(|(_, record)| identifiers_match(&record.id, identifier))
                .map(|(record, _)| MatchCandidate {
                    record,
                    evidence,
                    strategy: MatchStrategy::IdentifierEquality,
                    breakdown: None,
                })
                .collect();

            if !exact.is_empty() {
                debug!(identifier, candidates = exact.len(), "Identifier match");
                return Proposal::Candidates(exact);
            }
        }

        if records.is_empty() {
            return Proposal::NoCandidate { best_score: None };
        }

        let scored: Vec<(usize, ScoreBreakdown)> = records
            .iter()
            .enumerate()
            .map(|(index, record)| (index, scoring::score(record, &identity.hints)))
            .collect();
        let best_score = scored.iter().map(|(_, b)| b.total()).max();

        let mut accepted: Vec<MatchCandidate> = scored
            .into_iter()
            .filter(|(_, breakdown)| breakdown.total() >= self.fallback_threshold)
            .map(|(record, breakdown)| MatchCandidate {
                record,
                evidence,
                strategy: MatchStrategy::FallbackScore,
                breakdown: Some(breakdown),
            })
            .collect();

        if accepted.is_empty() {
            return Proposal::NoCandidate { best_score };
        }

        // Stable: equal scores keep record order
        accepted.sort_by_key(|c| std::cmp::Reverse(c.score().unwrap_or(0)));
        Proposal::Candidates(accepted)
    }

    /// Gate and resolve one candidate
    ///
    /// Order: participant count, self stack, seat mapping (with its duplicate
    /// check), then the seat-stacks gate over that mapping. A role-based
    /// mapping that fails the seat-stacks gate is re-resolved from visual
    /// positions and gated again; if that also fails, the role-based
    /// rejection is reported.
    pub fn confirm(
        &self,
        record: &Record,
        detail: &DetailPayload,
    ) -> Result<SeatMapping, RejectionReason> {
        gates::check_participant_count(record, detail).map_err(RejectionReason::Gate)?;
        gates::check_self_stack(record, detail).map_err(RejectionReason::Gate)?;

        let mapping = self
            .resolver
            .resolve(record, detail)
            .map_err(RejectionReason::Mapping)?;

        let rejection = match gates::check_seat_stacks(record, detail, &mapping) {
            Ok(()) => return Ok(mapping),
            Err(rejection) => rejection,
        };
        if mapping.strategy != ResolutionStrategy::RoleBased {
            return Err(RejectionReason::Gate(rejection));
        }

        match self.resolver.resolve_positional(record, detail) {
            Ok(positional) if gates::check_seat_stacks(record, detail, &positional).is_ok() => {
                debug!(
                    record = %record.id,
                    role_based = %rejection.measured,
                    "Role-based mapping too sparse, positional mapping confirmed"
                );
                Ok(positional)
            }
            _ => Err(RejectionReason::Gate(rejection)),
        }
    }

    /// Try candidates in order until one is confirmed
    pub fn confirm_first(
        &self,
        records: &[Record],
        candidates: &[MatchCandidate],
        detail: &DetailPayload,
    ) -> Confirmation {
        let mut confirmation = Confirmation::default();

        for candidate in candidates {
            let Some(record) = records.get(candidate.record) else {
                continue;
            };
            match self.confirm(record, detail) {
                Ok(mapping) => {
                    confirmation.confirmed = Some((candidate.clone(), mapping));
                    break;
                }
                Err(reason) => confirmation.rejected.push((candidate.clone(), reason)),
            }
        }

        confirmation
    }
}
