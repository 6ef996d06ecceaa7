//! Test Helper Utilities
//!
//! Shared fixtures for seatmap-engine integration tests: a scripted
//! recognizer with per-file answers and call accounting, record builders and
//! a short-timing engine config.

#![allow(dead_code)]

use async_trait::async_trait;
use seatmap_common::events::{EngineEvent, EventBus};
use seatmap_engine::recognition::{
    DetailPayload, DetailResult, DetectedPlayer, IdentityPayload, IdentityResult, MatchHints,
    RecognitionError, Recognizer, RoleIndicators,
};
use seatmap_engine::types::{Action, ActionKind, Card, Record, Seat, SELF_MARKER};
use seatmap_engine::{EngineConfig, EngineOutput, EvidenceImage};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;

// ============================================================================
// Scripted recognizer
// ============================================================================

type IdentityAnswer = Result<IdentityResult, RecognitionError>;
type DetailAnswer = Result<DetailResult, RecognitionError>;

/// Recognizer answering from a per-filename script
///
/// Identity answers are consumed in order; the last one repeats. Unscripted
/// files fail recognition.
#[derive(Default)]
pub struct ScriptedRecognizer {
    identity: Mutex<HashMap<String, Vec<IdentityAnswer>>>,
    details: Mutex<HashMap<String, DetailAnswer>>,
    delay: Duration,
    identity_calls: Mutex<HashMap<String, usize>>,
    detail_calls: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn identity(self, filename: &str, answer: IdentityAnswer) -> Self {
        self.identity_sequence(filename, vec![answer])
    }

    pub fn identity_sequence(self, filename: &str, answers: Vec<IdentityAnswer>) -> Self {
        self.identity
            .lock()
            .unwrap()
            .insert(filename.to_string(), answers);
        self
    }

    pub fn details(self, filename: &str, answer: DetailAnswer) -> Self {
        self.details
            .lock()
            .unwrap()
            .insert(filename.to_string(), answer);
        self
    }

    pub fn identity_calls(&self, filename: &str) -> usize {
        *self.identity_calls.lock().unwrap().get(filename).unwrap_or(&0)
    }

    pub fn detail_calls(&self, filename: &str) -> usize {
        *self.detail_calls.lock().unwrap().get(filename).unwrap_or(&0)
    }

    pub fn total_calls(&self) -> usize {
        let identity: usize = self.identity_calls.lock().unwrap().values().sum();
        let detail: usize = self.detail_calls.lock().unwrap().values().sum();
        identity + detail
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn recognize_identity(&self, image: &EvidenceImage) -> IdentityAnswer {
        let attempt = {
            let mut calls = self.identity_calls.lock().unwrap();
            let count = calls.entry(image.filename.clone()).or_default();
            *count += 1;
            *count
        };
        self.enter().await;

        let script = self.identity.lock().unwrap();
        match script.get(&image.filename) {
            Some(answers) if !answers.is_empty() => {
                let index = (attempt - 1).min(answers.len() - 1);
                answers[index].clone()
            }
            _ => Ok(IdentityResult::Failure {
                reason: "unscripted".to_string(),
            }),
        }
    }

    async fn recognize_details(&self, image: &EvidenceImage) -> DetailAnswer {
        *self
            .detail_calls
            .lock()
            .unwrap()
            .entry(image.filename.clone())
            .or_default() += 1;
        self.enter().await;

        self.details
            .lock()
            .unwrap()
            .get(&image.filename)
            .cloned()
            .unwrap_or_else(|| {
                Ok(DetailResult::Failure {
                    reason: "unscripted".to_string(),
                })
            })
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Engine config with short backoff and timeout
pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.identity_retry_backoff = Duration::from_millis(10);
    config.recognition.timeout = Duration::from_secs(2);
    config
}

pub fn image(filename: &str) -> EvidenceImage {
    EvidenceImage::new(filename, vec![0x89, 0x50, 0x4e, 0x47])
}

pub fn cards(list: &[&str]) -> Vec<Card> {
    list.iter().map(|c| Card::parse(c).unwrap()).collect()
}

/// Record on a named table; `seats` are (seat, identifier, stack)
pub fn record(id: &str, table: &str, button_seat: u8, seats: &[(u8, &str, f64)]) -> Record {
    Record {
        id: id.to_string(),
        table_name: Some(table.to_string()),
        stakes: "$0.05/$0.10".to_string(),
        format: "6-max NLHE".to_string(),
        table_size: 6,
        button_seat,
        seats: seats
            .iter()
            .map(|(n, pid, stack)| Seat::new(*n, *pid, *stack))
            .collect(),
        actions: vec![],
        hole_cards: vec![],
        board: vec![],
        raw_text: String::new(),
    }
}

/// "RC100": button seat 3, small blind seat 1 (self), big blind seat 2
pub fn role_fixture_record() -> Record {
    let mut rec = record(
        "RC100",
        "Aurora",
        3,
        &[(1, SELF_MARKER, 10.0), (2, "a1b2c3", 12.0), (3, "d4e5f6", 8.0)],
    );
    rec.actions = vec![
        Action::new(SELF_MARKER, ActionKind::PostSmallBlind),
        Action::new("a1b2c3", ActionKind::PostBigBlind),
        Action::new("d4e5f6", ActionKind::Other),
    ];
    rec
}

pub fn identified(identifier: &str) -> IdentityAnswer {
    Ok(IdentityResult::Success(IdentityPayload {
        identifier: Some(identifier.to_string()),
        hints: MatchHints::default(),
    }))
}

pub fn hinted(hints: MatchHints) -> IdentityAnswer {
    Ok(IdentityResult::Success(IdentityPayload {
        identifier: None,
        hints,
    }))
}

pub fn identity_failure(reason: &str) -> IdentityAnswer {
    Ok(IdentityResult::Failure {
        reason: reason.to_string(),
    })
}

pub fn player(name: &str, stack: f64, position: u8) -> DetectedPlayer {
    DetectedPlayer {
        name: name.to_string(),
        stack: Some(stack),
        visual_position: Some(position),
    }
}

pub fn roles(button: &str, small_blind: &str, big_blind: &str) -> RoleIndicators {
    RoleIndicators {
        button: Some(button.to_string()),
        small_blind: Some(small_blind.to_string()),
        big_blind: Some(big_blind.to_string()),
    }
}

pub fn detailed(players: Vec<DetectedPlayer>, self_name: &str, roles: RoleIndicators) -> DetailAnswer {
    Ok(DetailResult::Success(DetailPayload {
        players,
        self_name: Some(self_name.to_string()),
        roles,
    }))
}

pub fn detail_failure(reason: &str) -> DetailAnswer {
    Ok(DetailResult::Failure {
        reason: reason.to_string(),
    })
}

// ============================================================================
// Assertions
// ============================================================================

/// No table maps two identifiers to the same name
pub fn assert_no_duplicate_names(output: &EngineOutput) {
    for (table, names) in output.name_maps() {
        let unique: BTreeSet<&String> = names.values().collect();
        assert_eq!(
            unique.len(),
            names.len(),
            "table {} maps one name to several identifiers: {:?}",
            table,
            names
        );
    }
}

/// Drain every event currently buffered on a subscription
pub fn drain(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn event_bus() -> EventBus {
    EventBus::new(1024)
}

/// Best-effort test logging; repeated calls are harmless
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}
