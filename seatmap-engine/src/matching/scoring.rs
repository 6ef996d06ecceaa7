// Fallback similarity scoring
//
// Used only for record/evidence pairs whose identifiers do not match. The
// score is built from identity-pass hints; each signal either fully matches
// (its whole weight) or contributes nothing.
//
// Weights sum to 100:
//   hole cards 40, board 30, button position 15, name overlap 10, self stack 5

use crate::recognition::MatchHints;
use crate::types::{Card, Record};
use serde::Serialize;

pub const HOLE_CARDS_WEIGHT: u32 = 40;
pub const BOARD_WEIGHT: u32 = 30;
pub const POSITION_WEIGHT: u32 = 15;
pub const NAME_OVERLAP_WEIGHT: u32 = 10;
pub const STACK_WEIGHT: u32 = 5;

/// Relative tolerance for the hinted self stack
pub const STACK_HINT_TOLERANCE: f64 = 0.05;

/// Minimum Jaro-Winkler similarity for a fuzzy name match
pub const NAME_SIMILARITY: f64 = 0.95;

/// Which fallback signals matched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub hole_cards: bool,
    pub board: bool,
    pub position: bool,
    pub name_overlap: bool,
    pub stack: bool,
}

impl ScoreBreakdown {
    pub fn total(&self) -> u32 {
        [
            (self.hole_cards, HOLE_CARDS_WEIGHT),
            (self.board, BOARD_WEIGHT),
            (self.position, POSITION_WEIGHT),
            (self.name_overlap, NAME_OVERLAP_WEIGHT),
            (self.stack, STACK_WEIGHT),
        ]
        .iter()
        .filter(|(matched, _)| *matched)
        .map(|(_, weight)| weight)
        .sum()
    }

    /// Names of the matched signals, for audit output
    pub fn matched_signals(&self) -> Vec<&'static str> {
        let mut signals = Vec::new();
        if self.hole_cards {
            signals.push("hole_cards");
        }
        if self.board {
            signals.push("board");
        }
        if self.position {
            signals.push("position");
        }
        if self.name_overlap {
            signals.push("name_overlap");
        }
        if self.stack {
            signals.push("stack");
        }
        signals
    }
}

/// Score one record against identity-pass hints
pub fn score(record: &Record, hints: &MatchHints) -> ScoreBreakdown {
    ScoreBreakdown {
        hole_cards: same_card_set(&hints.hole_cards, &record.hole_cards),
        board: same_card_set(&hints.board, &record.board),
        position: position_matches(record, hints.button_position),
        name_overlap: names_overlap(record, &hints.names),
        stack: match (hints.self_stack, record.self_seat()) {
            (Some(hinted), Some(seat)) => within_tolerance(hinted, seat.stack, STACK_HINT_TOLERANCE),
            _ => false,
        },
    }
}

/// `|value - reference| <= tolerance * |reference|`; a zero reference only matches zero
pub fn within_tolerance(value: f64, reference: f64, tolerance: f64) -> bool {
    if reference == 0.0 {
        return value == 0.0;
    }
    (value - reference).abs() <= tolerance * reference.abs()
}

fn same_card_set(hinted: &[Card], recorded: &[Card]) -> bool {
    if hinted.is_empty() || recorded.is_empty() {
        return false;
    }
    let mut a: Vec<&Card> = hinted.iter().collect();
    let mut b: Vec<&Card> = recorded.iter().collect();
    a.sort();
    a.dedup();
    b.sort();
    b.dedup();
    a == b
}

/// Visual position of the button counted clockwise from the self anchor (1 = self)
fn position_matches(record: &Record, hinted: Option<u8>) -> bool {
    let (Some(hinted), Some(self_seat)) = (hinted, record.self_seat()) else {
        return false;
    };
    let n = i32::from(record.table_size);
    if n == 0 {
        return false;
    }
    let offset = (i32::from(record.button_seat) - i32::from(self_seat.number)).rem_euclid(n);
    i32::from(hinted) == offset + 1
}

fn names_overlap(record: &Record, hinted: &[String]) -> bool {
    hinted.iter().any(|name| {
        let name = name.trim().to_lowercase();
        record.plain_identifiers().any(|id| {
            let id = id.to_lowercase();
            id == name || strsim::jaro_winkler(&id, &name) >= NAME_SIMILARITY
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Seat, SELF_MARKER};

    fn cards(list: &[&str]) -> Vec<Card> {
        list.iter().map(|c| Card::parse(c).unwrap()).collect()
    }

    fn record() -> Record {
        Record {
            id: "RC200".to_string(),
            table_name: Some("Aurora".to_string()),
            stakes: "$0.05/$0.10".to_string(),
            format: "6-max".to_string(),
            table_size: 6,
            button_seat: 5,
            seats: vec![
                Seat::new(2, SELF_MARKER, 10.0),
                Seat::new(3, "Gyodong22", 9.5),
                Seat::new(5, "a1b2c3", 12.0),
            ],
            actions: vec![],
            hole_cards: cards(&["As", "Kd"]),
            board: cards(&["2c", "7h", "Ts"]),
            raw_text: String::new(),
        }
    }

    #[test]
    fn test_full_score() {
        let hints = MatchHints {
            hole_cards: cards(&["Kd", "As"]),
            board: cards(&["Ts", "2c", "7h"]),
            names: vec!["gyodong22".to_string()],
            self_stack: Some(10.2),
            // button seat 5, self seat 2: three seats clockwise, position 4
            button_position: Some(4),
        };
        let breakdown = score(&record(), &hints);
        assert_eq!(breakdown.total(), 100);
        assert_eq!(breakdown.matched_signals().len(), 5);
    }

    #[test]
    fn test_name_and_stack_only_below_threshold() {
        let hints = MatchHints {
            names: vec!["Gyodong22".to_string()],
            self_stack: Some(10.0),
            ..MatchHints::default()
        };
        let breakdown = score(&record(), &hints);
        assert_eq!(breakdown.total(), NAME_OVERLAP_WEIGHT + STACK_WEIGHT);
        assert!(breakdown.total() < 70);
    }

    #[test]
    fn test_partial_card_sets_do_not_count() {
        let hints = MatchHints {
            hole_cards: cards(&["As"]),
            board: cards(&["2c", "7h", "Ts", "Qd"]),
            ..MatchHints::default()
        };
        assert_eq!(score(&record(), &hints).total(), 0);
    }

    #[test]
    fn test_anonymized_ids_never_overlap() {
        let hints = MatchHints {
            names: vec!["a1b2c3".to_string()],
            ..MatchHints::default()
        };
        assert!(!score(&record(), &hints).name_overlap);
    }

    #[test]
    fn test_stack_tolerance() {
        let mut hints = MatchHints {
            self_stack: Some(10.6),
            ..MatchHints::default()
        };
        assert!(!score(&record(), &hints).stack);
        hints.self_stack = Some(9.5);
        assert!(score(&record(), &hints).stack);
    }

    #[test]
    fn test_within_tolerance_zero_reference() {
        assert!(within_tolerance(0.0, 0.0, 0.3));
        assert!(!within_tolerance(0.1, 0.0, 0.3));
        assert!(within_tolerance(13.0, 10.0, 0.3));
        assert!(!within_tolerance(13.1, 10.0, 0.3));
    }
}
