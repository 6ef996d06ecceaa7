//! Two-stage extraction orchestration
//!
//! # Job phases
//! 1. **Limits**: input ceilings checked before any recognition call
//! 2. **Identity pass**: every evidence, bounded concurrency, one retry
//! 3. **Matching**: candidates proposed per identified evidence
//! 4. **Detail pass**: matched evidence only, no retry
//! 5. **Confirmation**: gates and seat-mapping resolution per candidate
//! 6. **Aggregation**: confirmed mappings merged per table
//!
//! Each pass is a barrier: tasks run concurrently, their outcomes are written
//! into the evidence arena only once every task of the pass is terminal.

pub mod context;
pub mod statistics;

pub use context::JobContext;
pub use statistics::{CallStats, JobStatistics, OutcomeStats};

use crate::aggregator::{ConfirmedMapping, MergeConflict, TableAggregator};
use crate::config::{CallerTier, EngineConfig};
use crate::error::{EngineError, EngineResult};
use crate::evidence::{DiscardReason, Evidence, EvidenceImage, EvidenceStatus};
use crate::matching::{CandidateMatcher, MatchCandidate, MatchStrategy, Proposal, RejectionReason};
use crate::recognition::{RecognitionError, Recognizer};
use crate::report::{CandidateRejection, EngineOutput, EvidenceAudit, RecordReport, RecordStatus};
use crate::resolver::MappingRejection;
use crate::types::Record;
use chrono::Utc;
use futures::future::join_all;
use seatmap_common::events::{EngineEvent, EventBus};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Input of one mapping job
#[derive(Debug, Clone, Default)]
pub struct MappingJob {
    pub records: Vec<Record>,
    /// Screenshots in supply order; this order drives the table merge
    pub evidence: Vec<EvidenceImage>,
    pub tier: CallerTier,
}

/// Runs mapping jobs against one recognition backend
pub struct MappingOrchestrator {
    recognizer: Arc<dyn Recognizer>,
    config: EngineConfig,
    matcher: CandidateMatcher,
    aggregator: TableAggregator,
    events: EventBus,
}

impl MappingOrchestrator {
    pub fn new(recognizer: Arc<dyn Recognizer>, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            recognizer,
            matcher: CandidateMatcher::new(config.fallback_threshold),
            aggregator: TableAggregator::new(),
            config,
            events: EventBus::default(),
        })
    }

    /// Publish audit events on a caller-owned bus
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn check_limits(&self, job: &MappingJob) -> EngineResult<()> {
        if job.records.len() > self.config.max_records {
            return Err(EngineError::LimitExceeded {
                what: "records",
                count: job.records.len(),
                limit: self.config.max_records,
            });
        }
        if job.evidence.len() > self.config.max_evidence {
            return Err(EngineError::LimitExceeded {
                what: "evidence",
                count: job.evidence.len(),
                limit: self.config.max_evidence,
            });
        }
        Ok(())
    }

    /// Run one job to completion
    ///
    /// Only ceilings and recognition backend errors return `Err`; every
    /// data-quality outcome is part of the returned [`EngineOutput`].
    pub async fn run(&self, job: MappingJob) -> EngineResult<EngineOutput> {
        self.check_limits(&job)?;
        let started = Instant::now();

        let ctx = JobContext::new(
            Arc::clone(&self.recognizer),
            job.tier,
            self.config.concurrency_for(job.tier),
            self.config.recognition.timeout,
            self.config.identity_retry_backoff,
            self.events.clone(),
        );
        let job_id = ctx.job_id;

        // Records breaking structural invariants never enter the arena
        let mut records: Vec<Record> = Vec::with_capacity(job.records.len());
        let mut invalid: BTreeMap<usize, String> = BTreeMap::new();
        for (index, record) in job.records.iter().enumerate() {
            match record.check_invariants() {
                Ok(()) => records.push(record.clone()),
                Err(reason) => {
                    warn!(job_id = %job_id, record = %record.id, reason = %reason, "Invalid record skipped");
                    invalid.insert(index, reason);
                }
            }
        }

        info!(
            job_id = %job_id,
            records = records.len(),
            evidence = job.evidence.len(),
            tier = job.tier.as_str(),
            ceiling = ctx.ceiling(),
            backend = self.recognizer.name(),
            "Starting mapping job"
        );
        ctx.emit(EngineEvent::JobStarted {
            job_id,
            records: records.len(),
            evidence: job.evidence.len(),
            timestamp: Utc::now(),
        });

        let mut arena: Vec<Evidence> = job
            .evidence
            .iter()
            .map(|image| Evidence::new(image.filename.clone()))
            .collect();
        let mut audits: Vec<EvidenceAudit> = Vec::with_capacity(arena.len());

        // Identity pass
        let identity_results = join_all(job.evidence.iter().map(|image| ctx.identify(image))).await;
        for (evidence, result) in arena.iter_mut().zip(identity_results) {
            let outcome = result.map_err(|e| abort(job_id, "identity", e))?;
            ctx.emit(EngineEvent::IdentityPassComplete {
                job_id,
                filename: evidence.filename.clone(),
                success: outcome.success(),
                attempts: outcome.attempts,
            });
            let success = outcome.success();
            evidence.identity = Some(outcome);
            if success {
                evidence.status = EvidenceStatus::Identified;
            } else {
                discard(&ctx, evidence, DiscardReason::IdentityFailed);
            }
        }
        debug!(job_id = %job_id, "Identity pass complete");

        // Matching
        let mut candidates: Vec<Vec<MatchCandidate>> = vec![Vec::new(); arena.len()];
        let mut best_scores: Vec<Option<u32>> = vec![None; arena.len()];
        for (index, evidence) in arena.iter_mut().enumerate() {
            let Some(identity) = evidence.identity_payload() else {
                continue;
            };
            match self.matcher.propose(&records, index, identity) {
                Proposal::Candidates(found) => {
                    debug!(
                        job_id = %job_id,
                        evidence = %evidence.filename,
                        candidates = found.len(),
                        "Evidence matched"
                    );
                    candidates[index] = found;
                    evidence.status = EvidenceStatus::Matched;
                }
                Proposal::NoCandidate { best_score } => {
                    best_scores[index] = best_score;
                    discard(&ctx, evidence, DiscardReason::NoCandidate);
                }
            }
        }

        // Detail pass, matched evidence only
        let matched: Vec<usize> = (0..arena.len())
            .filter(|&i| arena[i].status == EvidenceStatus::Matched)
            .collect();
        let detail_results =
            join_all(matched.iter().map(|&i| ctx.detail(&job.evidence[i]))).await;

        let mut detail_incomplete: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for (&index, result) in matched.iter().zip(detail_results) {
            let outcome = result.map_err(|e| abort(job_id, "detail", e))?;
            let evidence = &mut arena[index];
            ctx.emit(EngineEvent::DetailPassComplete {
                job_id,
                filename: evidence.filename.clone(),
                success: outcome.success(),
            });
            let success = outcome.success();
            evidence.detail = Some(outcome);
            if !success {
                for record in attributable(&candidates[index]) {
                    detail_incomplete
                        .entry(record)
                        .or_default()
                        .push(evidence.filename.clone());
                }
                discard(&ctx, evidence, DiscardReason::DetailFailed);
            }
        }
        debug!(job_id = %job_id, detail_calls = matched.len(), "Detail pass complete");

        // Confirmation
        let mut confirmed: Vec<ConfirmedMapping> = Vec::new();
        let mut rejections: Vec<Vec<CandidateRejection>> = vec![Vec::new(); arena.len()];
        for &index in &matched {
            let evidence = &mut arena[index];
            let Some(detail) = evidence.detail_payload() else {
                continue;
            };
            let confirmation = self
                .matcher
                .confirm_first(&records, &candidates[index], detail);

            for (candidate, reason) in confirmation.rejected {
                let record_id = records[candidate.record].id.clone();
                report_rejection(&ctx, &evidence.filename, &record_id, &reason);
                rejections[index].push(CandidateRejection { record_id, reason });
            }

            match confirmation.confirmed {
                Some((candidate, mapping)) => {
                    info!(
                        job_id = %job_id,
                        evidence = %evidence.filename,
                        record = %records[candidate.record].id,
                        strategy = ?mapping.strategy,
                        seats = mapping.len(),
                        "Candidate confirmed"
                    );
                    evidence.status = EvidenceStatus::Confirmed {
                        record: candidate.record,
                    };
                    confirmed.push(ConfirmedMapping {
                        record: candidate.record,
                        evidence: index,
                        contributor: evidence.filename.clone(),
                        mapping,
                    });
                }
                None => {
                    let only_gates = rejections[index]
                        .iter()
                        .all(|r| matches!(r.reason, RejectionReason::Gate(_)));
                    let reason = if only_gates {
                        DiscardReason::ValidationFailed
                    } else {
                        DiscardReason::MappingRejected
                    };
                    discard(&ctx, evidence, reason);
                }
            }
        }

        // Aggregation
        let aggregation = self.aggregator.aggregate(&records, &confirmed);
        emit_conflicts(&ctx, &aggregation.conflicts);

        // Record outcomes, in supply order
        let mut confirmed_by_record: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for entry in &confirmed {
            confirmed_by_record
                .entry(entry.record)
                .or_default()
                .push(entry.contributor.clone());
        }

        let mut record_reports = Vec::with_capacity(job.records.len());
        let mut arena_index = 0;
        for (index, record) in job.records.iter().enumerate() {
            let status = if let Some(reason) = invalid.remove(&index) {
                RecordStatus::Invalid { reason }
            } else {
                let slot = arena_index;
                arena_index += 1;
                if let Some(evidence) = confirmed_by_record.remove(&slot) {
                    RecordStatus::Matched { evidence }
                } else if let Some(evidence) = detail_incomplete.remove(&slot) {
                    RecordStatus::MatchedDetailIncomplete { evidence }
                } else {
                    RecordStatus::Unmatched
                }
            };
            record_reports.push(RecordReport {
                record_id: record.id.clone(),
                table: record.table_identity(),
                status,
            });
        }

        for (index, evidence) in arena.iter().enumerate() {
            let mut audit = EvidenceAudit::new(evidence);
            audit.candidates = std::mem::take(&mut candidates[index]);
            audit.best_score = best_scores[index];
            audit.rejections = std::mem::take(&mut rejections[index]);
            audits.push(audit);
        }

        let statistics = JobStatistics {
            calls: CallStats::from_counters(&ctx.counters, ctx.ceiling()),
            outcomes: outcome_stats(&record_reports, &audits, aggregation.conflicts.len()),
            elapsed: started.elapsed(),
        };

        info!(
            job_id = %job_id,
            tables = aggregation.tables.len(),
            "Mapping job complete: {}",
            statistics.display_string()
        );
        ctx.emit(EngineEvent::JobCompleted {
            job_id,
            tables: aggregation.tables.len(),
            matched_records: statistics.outcomes.records_matched,
            discarded_evidence: statistics.outcomes.evidence_discarded,
            timestamp: Utc::now(),
        });

        Ok(EngineOutput {
            job_id,
            tables: aggregation.tables,
            records: record_reports,
            evidence: audits,
            conflicts: aggregation.conflicts,
            statistics,
        })
    }
}

fn abort(job_id: Uuid, pass: &str, err: RecognitionError) -> EngineError {
    error!(job_id = %job_id, pass, error = %err, "Recognition backend error, aborting job");
    EngineError::RecognitionBackend(err)
}

/// Records a detail-failed evidence can be pinned to
///
/// Identifier matches always can. Fallback candidates only when there was
/// exactly one, since several scored candidates never settled on a record.
fn attributable(candidates: &[MatchCandidate]) -> Vec<usize> {
    let exact: Vec<usize> = candidates
        .iter()
        .filter(|c| c.strategy == MatchStrategy::IdentifierEquality)
        .map(|c| c.record)
        .collect();

    match (exact.is_empty(), candidates) {
        (false, _) => exact,
        (true, [only]) => vec![only.record],
        (true, _) => Vec::new(),
    }
}

fn discard(ctx: &JobContext, evidence: &mut Evidence, reason: DiscardReason) {
    debug!(job_id = %ctx.job_id, evidence = %evidence.filename, reason = %reason, "Evidence discarded");
    evidence.discard(reason);
    ctx.emit(EngineEvent::EvidenceDiscarded {
        job_id: ctx.job_id,
        filename: evidence.filename.clone(),
        reason: reason.to_string(),
    });
}

fn report_rejection(ctx: &JobContext, filename: &str, record_id: &str, reason: &RejectionReason) {
    match reason {
        RejectionReason::Gate(rejection) => {
            warn!(
                job_id = %ctx.job_id,
                evidence = filename,
                record = record_id,
                gate = %rejection.gate,
                measured = %rejection.measured,
                "Candidate rejected by validation gate"
            );
            ctx.emit(EngineEvent::CandidateRejected {
                job_id: ctx.job_id,
                filename: filename.to_string(),
                record_id: record_id.to_string(),
                gate: rejection.gate.to_string(),
                measured: rejection.measured.clone(),
            });
        }
        RejectionReason::Mapping(MappingRejection::DuplicateName { name, identifiers }) => {
            warn!(
                job_id = %ctx.job_id,
                evidence = filename,
                record = record_id,
                name = %name,
                identifiers = ?identifiers,
                "Duplicate name in seat mapping, mapping discarded"
            );
            ctx.emit(EngineEvent::DuplicateNameConflict {
                job_id: ctx.job_id,
                record_id: record_id.to_string(),
                name: name.clone(),
                identifiers: identifiers.clone(),
            });
        }
        RejectionReason::Mapping(rejection) => {
            warn!(
                job_id = %ctx.job_id,
                evidence = filename,
                record = record_id,
                reason = %rejection,
                "Seat mapping rejected"
            );
            ctx.emit(EngineEvent::CandidateRejected {
                job_id: ctx.job_id,
                filename: filename.to_string(),
                record_id: record_id.to_string(),
                gate: "seat_mapping".to_string(),
                measured: rejection.to_string(),
            });
        }
    }
}

fn outcome_stats(
    records: &[RecordReport],
    audits: &[EvidenceAudit],
    merge_conflicts: usize,
) -> OutcomeStats {
    let mut stats = OutcomeStats {
        evidence_total: audits.len(),
        records_total: records.len(),
        merge_conflicts,
        ..OutcomeStats::default()
    };

    for audit in audits {
        match audit.status {
            EvidenceStatus::Confirmed { .. } => stats.evidence_confirmed += 1,
            EvidenceStatus::Discarded { .. } => stats.evidence_discarded += 1,
            _ => {}
        }
        stats.candidates_rejected += audit.rejections.len();
    }

    for record in records {
        match record.status {
            RecordStatus::Matched { .. } => stats.records_matched += 1,
            RecordStatus::MatchedDetailIncomplete { .. } => stats.records_detail_incomplete += 1,
            RecordStatus::Invalid { .. } => stats.records_invalid += 1,
            RecordStatus::Unmatched => {}
        }
    }

    stats
}

/// Publish identifier conflicts; name collisions stay in the output only
fn emit_conflicts(ctx: &JobContext, conflicts: &[MergeConflict]) {
    for conflict in conflicts {
        if let MergeConflict::ConflictingName {
            table,
            identifier,
            kept,
            rejected,
            ..
        } = conflict
        {
            ctx.emit(EngineEvent::TableMergeConflict {
                job_id: ctx.job_id,
                table: table.to_string(),
                identifier: identifier.clone(),
                kept: kept.clone(),
                rejected: rejected.clone(),
            });
        }
    }
}
