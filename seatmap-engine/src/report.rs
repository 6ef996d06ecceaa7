//! Engine output
//!
//! Everything the output writer and auditors need: per-table name maps,
//! per-record outcomes, per-evidence audit trails, merge conflicts and job
//! statistics. All keyed collections are ordered so identical inputs give
//! identical output.

use crate::aggregator::{MergeConflict, TableReport};
use crate::evidence::{DiscardReason, Evidence, EvidenceStatus};
use crate::matching::{MatchCandidate, RejectionReason};
use crate::orchestrator::statistics::JobStatistics;
use crate::types::TableIdentity;
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordStatus {
    /// At least one evidence confirmed a seat mapping for this record
    Matched { evidence: Vec<String> },
    /// Proposed as a candidate, but the detail pass failed
    MatchedDetailIncomplete { evidence: Vec<String> },
    Unmatched,
    /// Record broke a structural invariant and was left out of the job
    Invalid { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordReport {
    pub record_id: String,
    pub table: TableIdentity,
    #[serde(flatten)]
    pub status: RecordStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateRejection {
    pub record_id: String,
    pub reason: RejectionReason,
}

/// Audit trail of one evidence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceAudit {
    pub filename: String,
    pub status: EvidenceStatus,
    pub identity_success: bool,
    pub identifier: Option<String>,
    pub identity_attempts: u32,
    pub identity_error: Option<String>,
    /// `None` when the detail pass never ran
    pub detail_success: Option<bool>,
    pub detail_error: Option<String>,
    pub candidates: Vec<MatchCandidate>,
    /// Best fallback score when no candidate reached the threshold
    pub best_score: Option<u32>,
    pub rejections: Vec<CandidateRejection>,
}

impl EvidenceAudit {
    pub(crate) fn new(evidence: &Evidence) -> Self {
        let identity = evidence.identity.as_ref();
        let detail = evidence.detail.as_ref();
        Self {
            filename: evidence.filename.clone(),
            status: evidence.status,
            identity_success: identity.is_some_and(|o| o.success()),
            identifier: identity.and_then(|o| o.identifier()).map(str::to_string),
            identity_attempts: identity.map_or(0, |o| o.attempts),
            identity_error: identity.and_then(|o| o.error.clone()),
            detail_success: detail.map(|o| o.success()),
            detail_error: detail.and_then(|o| o.error.clone()),
            candidates: Vec::new(),
            best_score: None,
            rejections: Vec::new(),
        }
    }

    pub fn discard_reason(&self) -> Option<DiscardReason> {
        match self.status {
            EvidenceStatus::Discarded { reason } => Some(reason),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineOutput {
    pub job_id: Uuid,
    pub tables: BTreeMap<TableIdentity, TableReport>,
    /// One entry per input record, in supply order
    pub records: Vec<RecordReport>,
    /// One entry per input evidence, in supply order
    pub evidence: Vec<EvidenceAudit>,
    pub conflicts: Vec<MergeConflict>,
    pub statistics: JobStatistics,
}

impl EngineOutput {
    /// Table identity → (identifier or self marker → real name)
    ///
    /// Tables without any mapped identifier are included with an empty map.
    pub fn name_maps(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        self.tables
            .iter()
            .map(|(table, report)| (table.to_string(), report.mapping.entries().clone()))
            .collect()
    }

    /// Table identity → identifiers left unmapped
    pub fn unmapped(&self) -> BTreeMap<String, Vec<String>> {
        self.tables
            .iter()
            .map(|(table, report)| (table.to_string(), report.unmapped.clone()))
            .collect()
    }

    /// Discarded evidence filenames with their reasons, in supply order
    pub fn discards(&self) -> Vec<(&str, DiscardReason)> {
        self.evidence
            .iter()
            .filter_map(|e| e.discard_reason().map(|r| (e.filename.as_str(), r)))
            .collect()
    }

    pub fn record_status(&self, record_id: &str) -> Option<&RecordStatus> {
        self.records
            .iter()
            .find(|r| r.record_id == record_id)
            .map(|r| &r.status)
    }

    pub fn evidence_audit(&self, filename: &str) -> Option<&EvidenceAudit> {
        self.evidence.iter().find(|e| e.filename == filename)
    }

    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables
            .iter()
            .find(|(table, _)| table.to_string() == name)
            .map(|(_, report)| report)
    }
}
