//! Engine event types and event bus
//!
//! Events form the audit trail of a mapping job. They are broadcast on a
//! `tokio::sync::broadcast` channel; emitting with no subscribers is not an
//! error for the job, the event is simply dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Audit events emitted during a mapping job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Job accepted and orchestration started
    JobStarted {
        job_id: Uuid,
        records: usize,
        evidence: usize,
        timestamp: DateTime<Utc>,
    },

    /// Identity pass reached a terminal state for one evidence
    IdentityPassComplete {
        job_id: Uuid,
        filename: String,
        success: bool,
        attempts: u32,
    },

    /// Evidence permanently excluded from further processing
    EvidenceDiscarded {
        job_id: Uuid,
        filename: String,
        reason: String,
    },

    /// Detail pass reached a terminal state for one evidence
    DetailPassComplete {
        job_id: Uuid,
        filename: String,
        success: bool,
    },

    /// A record/evidence candidate failed a validation gate
    CandidateRejected {
        job_id: Uuid,
        filename: String,
        record_id: String,
        gate: String,
        measured: String,
    },

    /// Two identifiers of one record resolved to the same name
    DuplicateNameConflict {
        job_id: Uuid,
        record_id: String,
        name: String,
        identifiers: Vec<String>,
    },

    /// A table-wide merge found conflicting values
    TableMergeConflict {
        job_id: Uuid,
        table: String,
        identifier: String,
        kept: String,
        rejected: String,
    },

    /// Job finished
    JobCompleted {
        job_id: Uuid,
        tables: usize,
        matched_records: usize,
        discarded_evidence: usize,
        timestamp: DateTime<Utc>,
    },
}

impl EngineEvent {
    /// Job this event belongs to
    pub fn job_id(&self) -> Uuid {
        match self {
            Self::JobStarted { job_id, .. }
            | Self::IdentityPassComplete { job_id, .. }
            | Self::EvidenceDiscarded { job_id, .. }
            | Self::DetailPassComplete { job_id, .. }
            | Self::CandidateRejected { job_id, .. }
            | Self::DuplicateNameConflict { job_id, .. }
            | Self::TableMergeConflict { job_id, .. }
            | Self::JobCompleted { job_id, .. } => *job_id,
        }
    }
}

/// Broadcast bus for engine events
///
/// Cloning is cheap; all clones share one channel.
///
/// ```
/// use seatmap_common::events::EventBus;
///
/// let bus = EventBus::new(100);
/// let mut rx = bus.subscribe();
/// assert_eq!(bus.capacity(), 100);
/// # drop(rx.try_recv());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per slow subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, returning the number of subscribers that received it
    pub fn emit(&self, event: EngineEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
