//! Job statistics
//!
//! Snapshot of the job counters plus outcome tallies, for the engine output
//! and the completion log line.

use super::context::CallCounters;
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// Recognition call statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CallStats {
    pub identity_calls: usize,
    pub detail_calls: usize,
    /// Identity retries (at most one per evidence)
    pub retries: usize,
    pub timeouts: usize,
    /// Highest number of calls in flight at once
    pub peak_in_flight: usize,
    /// Ceiling the job ran under
    pub ceiling: usize,
}

impl CallStats {
    pub fn from_counters(counters: &CallCounters, ceiling: usize) -> Self {
        Self {
            identity_calls: counters.identity_calls.load(Ordering::Relaxed),
            detail_calls: counters.detail_calls.load(Ordering::Relaxed),
            retries: counters.retries.load(Ordering::Relaxed),
            timeouts: counters.timeouts.load(Ordering::Relaxed),
            peak_in_flight: counters.peak_in_flight.load(Ordering::SeqCst),
            ceiling,
        }
    }

    pub fn display_string(&self) -> String {
        format!(
            "{} identity calls ({} retries), {} detail calls, {} timeouts, peak {}/{}",
            self.identity_calls,
            self.retries,
            self.detail_calls,
            self.timeouts,
            self.peak_in_flight,
            self.ceiling
        )
    }
}

/// Evidence and record outcome tallies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeStats {
    pub evidence_total: usize,
    pub evidence_confirmed: usize,
    pub evidence_discarded: usize,
    pub records_total: usize,
    pub records_matched: usize,
    pub records_detail_incomplete: usize,
    pub records_invalid: usize,
    pub candidates_rejected: usize,
    pub merge_conflicts: usize,
}

impl OutcomeStats {
    pub fn display_string(&self) -> String {
        format!(
            "{}/{} evidence confirmed, {} discarded; {}/{} records matched",
            self.evidence_confirmed,
            self.evidence_total,
            self.evidence_discarded,
            self.records_matched,
            self.records_total
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobStatistics {
    pub calls: CallStats,
    pub outcomes: OutcomeStats,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl JobStatistics {
    pub fn display_string(&self) -> String {
        format!(
            "{}; {} in {:.2}s",
            self.outcomes.display_string(),
            self.calls.display_string(),
            self.elapsed.as_secs_f64()
        )
    }
}
