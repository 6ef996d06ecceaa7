//! Per-job execution context
//!
//! Owns everything a job shares across its recognition tasks: the
//! concurrency limiter, call counters, timing settings and the audit sink.
//! Nothing here outlives the job.

use crate::config::CallerTier;
use crate::evidence::{DetailOutcome, EvidenceImage, IdentityOutcome};
use crate::recognition::{DetailResult, IdentityResult, RecognitionError, Recognizer};
use seatmap_common::events::{EngineEvent, EventBus};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use uuid::Uuid;

/// Failure reason recorded when a call exceeds the per-call timeout
pub const TIMEOUT_REASON: &str = "timeout";

#[derive(Debug, Default)]
pub struct CallCounters {
    pub identity_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
    pub retries: AtomicUsize,
    pub timeouts: AtomicUsize,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

/// Decrements the in-flight gauge when the call finishes, however it finishes
struct InFlight<'a>(&'a CallCounters);

impl<'a> InFlight<'a> {
    fn enter(counters: &'a CallCounters) -> Self {
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct JobContext {
    pub job_id: Uuid,
    pub tier: CallerTier,
    recognizer: Arc<dyn Recognizer>,
    limiter: Arc<Semaphore>,
    ceiling: usize,
    call_timeout: Duration,
    retry_backoff: Duration,
    events: EventBus,
    pub counters: CallCounters,
}

impl JobContext {
    pub fn new(
        recognizer: Arc<dyn Recognizer>,
        tier: CallerTier,
        ceiling: usize,
        call_timeout: Duration,
        retry_backoff: Duration,
        events: EventBus,
    ) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            tier,
            recognizer,
            limiter: Arc::new(Semaphore::new(ceiling)),
            ceiling,
            call_timeout,
            retry_backoff,
            events,
            counters: CallCounters::default(),
        }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    pub fn emit(&self, event: EngineEvent) {
        self.events.emit(event);
    }

    /// Run one recognition call under the limiter and the per-call timeout
    ///
    /// `Ok(None)` means the call timed out.
    async fn limited<T, F>(&self, call: F) -> Result<Option<T>, RecognitionError>
    where
        F: Future<Output = Result<T, RecognitionError>>,
    {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| RecognitionError::Unavailable("job limiter closed".to_string()))?;
        let _in_flight = InFlight::enter(&self.counters);

        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result.map(Some),
            Err(_) => {
                self.counters.timeouts.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn identity_attempt(&self, image: &EvidenceImage) -> Result<IdentityResult, RecognitionError> {
        self.counters.identity_calls.fetch_add(1, Ordering::Relaxed);
        let result = self
            .limited(self.recognizer.recognize_identity(image))
            .await?;
        Ok(result.unwrap_or_else(|| IdentityResult::Failure {
            reason: TIMEOUT_REASON.to_string(),
        }))
    }

    /// Identity pass for one evidence: one attempt, one retry after a fixed backoff
    ///
    /// The limiter permit is released during the backoff.
    pub async fn identify(&self, image: &EvidenceImage) -> Result<IdentityOutcome, RecognitionError> {
        let mut attempts = 0;
        let mut last_error = None;

        while attempts < 2 {
            if attempts == 1 {
                self.counters.retries.fetch_add(1, Ordering::Relaxed);
                debug!(
                    job_id = %self.job_id,
                    evidence = %image.filename,
                    backoff_ms = self.retry_backoff.as_millis() as u64,
                    "Retrying identity pass"
                );
                tokio::time::sleep(self.retry_backoff).await;
            }
            attempts += 1;

            match self.identity_attempt(image).await? {
                IdentityResult::Success(payload) => {
                    return Ok(IdentityOutcome {
                        payload: Some(payload),
                        error: None,
                        attempts,
                    });
                }
                IdentityResult::Failure { reason } => {
                    warn!(
                        job_id = %self.job_id,
                        evidence = %image.filename,
                        attempt = attempts,
                        reason = %reason,
                        "Identity pass failed"
                    );
                    last_error = Some(reason);
                }
            }
        }

        Ok(IdentityOutcome {
            payload: None,
            error: last_error,
            attempts,
        })
    }

    /// Detail pass for one evidence; failures are terminal
    pub async fn detail(&self, image: &EvidenceImage) -> Result<DetailOutcome, RecognitionError> {
        self.counters.detail_calls.fetch_add(1, Ordering::Relaxed);
        let result = self
            .limited(self.recognizer.recognize_details(image))
            .await?;

        Ok(match result {
            Some(DetailResult::Success(payload)) => DetailOutcome {
                payload: Some(payload),
                error: None,
            },
            Some(DetailResult::Failure { reason }) => {
                warn!(
                    job_id = %self.job_id,
                    evidence = %image.filename,
                    reason = %reason,
                    "Detail pass failed"
                );
                DetailOutcome {
                    payload: None,
                    error: Some(reason),
                }
            }
            None => {
                warn!(job_id = %self.job_id, evidence = %image.filename, "Detail pass timed out");
                DetailOutcome {
                    payload: None,
                    error: Some(TIMEOUT_REASON.to_string()),
                }
            }
        })
    }

    pub fn peak_in_flight(&self) -> usize {
        self.counters.peak_in_flight.load(Ordering::SeqCst)
    }
}
