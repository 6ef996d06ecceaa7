//! Validation gates applied before a candidate is confirmed
//!
//! A failing gate rejects the candidate regardless of how it was matched.

use super::scoring::within_tolerance;
use crate::recognition::DetailPayload;
use crate::types::{Record, SeatMapping};
use serde::Serialize;
use std::fmt;

/// Self stack must be within this fraction of the evidence's self stack
pub const SELF_STACK_TOLERANCE: f64 = 0.25;

/// Per-seat stack tolerance for the seat-stacks gate
pub const SEAT_STACK_TOLERANCE: f64 = 0.30;

/// Fraction of seats whose stacks must agree
pub const SEAT_STACK_QUORUM: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    ParticipantCount,
    SelfStack,
    SeatStacks,
}

impl Gate {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ParticipantCount => "participant_count",
            Self::SelfStack => "self_stack",
            Self::SeatStacks => "seat_stacks",
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failed gate plus the values it measured
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateRejection {
    pub gate: Gate,
    pub measured: String,
}

impl GateRejection {
    fn new(gate: Gate, measured: String) -> Self {
        Self { gate, measured }
    }
}

pub fn check_participant_count(record: &Record, detail: &DetailPayload) -> Result<(), GateRejection> {
    let (seats, names) = (record.participant_count(), detail.participant_count());
    if seats == names {
        Ok(())
    } else {
        Err(GateRejection::new(
            Gate::ParticipantCount,
            format!("record seats {} != evidence names {}", seats, names),
        ))
    }
}

pub fn check_self_stack(record: &Record, detail: &DetailPayload) -> Result<(), GateRejection> {
    let recorded = record.self_seat().map(|s| s.stack);
    let observed = detail.self_stack();

    match (recorded, observed) {
        (Some(r), Some(o)) if within_tolerance(r, o, SELF_STACK_TOLERANCE) => Ok(()),
        (Some(r), Some(o)) => Err(GateRejection::new(
            Gate::SelfStack,
            format!("record self stack {} vs evidence {} (±25%)", r, o),
        )),
        (None, _) => Err(GateRejection::new(
            Gate::SelfStack,
            "record has no self seat".to_string(),
        )),
        (_, None) => Err(GateRejection::new(
            Gate::SelfStack,
            "evidence has no self stack".to_string(),
        )),
    }
}

/// At least half of the record's seats must carry a stack close to the
/// evidence stack of the name the mapping assigns to that seat
pub fn check_seat_stacks(
    record: &Record,
    detail: &DetailPayload,
    mapping: &SeatMapping,
) -> Result<(), GateRejection> {
    let total = record.seats.len();
    let agreeing = record
        .seats
        .iter()
        .filter(|seat| {
            mapping
                .name_for_seat(seat.number)
                .and_then(|name| detail.stack_of(name))
                .is_some_and(|observed| {
                    within_tolerance(seat.stack, observed, SEAT_STACK_TOLERANCE)
                })
        })
        .count();

    if total > 0 && agreeing as f64 >= SEAT_STACK_QUORUM * total as f64 {
        Ok(())
    } else {
        Err(GateRejection::new(
            Gate::SeatStacks,
            format!("{}/{} seat stacks within ±30%", agreeing, total),
        ))
    }
}
