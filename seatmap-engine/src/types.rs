//! Core record and mapping types
//!
//! Records come from the parsing collaborator and are read-only for the whole
//! job. Mappings are produced by the resolver and are immutable once built.

use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Literal placeholder for the perspective-holder of a record
pub const SELF_MARKER: &str = "Hero";

// ============================================================================
// Cards
// ============================================================================

/// A playing card in canonical two-character form (`"As"`, `"Td"`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Card(String);

impl Card {
    /// Parse a card, accepting `10` for ten, any case, and suit symbols
    ///
    /// Returns `None` for anything that is not a single valid card.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (rank_part, suit_part) = match text.char_indices().last() {
            Some((idx, _)) if idx > 0 => text.split_at(idx),
            _ => return None,
        };

        let rank = match rank_part.to_ascii_uppercase().as_str() {
            "10" | "T" => 'T',
            "J" => 'J',
            "Q" => 'Q',
            "K" => 'K',
            "A" => 'A',
            r if r.len() == 1 && matches!(r.as_bytes()[0], b'2'..=b'9') => r.as_bytes()[0] as char,
            _ => return None,
        };

        let suit = match suit_part {
            "s" | "S" | "♠" => 's',
            "h" | "H" | "♥" => 'h',
            "d" | "D" | "♦" => 'd',
            "c" | "C" | "♣" => 'c',
            _ => return None,
        };

        Some(Self(format!("{}{}", rank, suit)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Seats, roles and actions
// ============================================================================

/// Forced-bet and dealer roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Button,
    SmallBlind,
    BigBlind,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Button, Role::SmallBlind, Role::BigBlind];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Button => "button",
            Self::SmallBlind => "small_blind",
            Self::BigBlind => "big_blind",
        }
    }
}

/// One occupied seat of a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seat {
    /// Seat number, 1..=table_size
    pub number: u8,
    /// Anonymized identifier or [`SELF_MARKER`]
    pub player_id: String,
    /// Starting stack for the hand
    pub stack: f64,
}

impl Seat {
    pub fn new(number: u8, player_id: impl Into<String>, stack: f64) -> Self {
        Self {
            number,
            player_id: player_id.into(),
            stack,
        }
    }

    pub fn is_self(&self) -> bool {
        self.player_id == SELF_MARKER
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    PostSmallBlind,
    PostBigBlind,
    Other,
}

/// One entry of the record's action log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub player_id: String,
    pub kind: ActionKind,
}

impl Action {
    pub fn new(player_id: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            player_id: player_id.into(),
            kind,
        }
    }
}

// ============================================================================
// Table identity
// ============================================================================

/// Grouping key for records and their evidence
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableIdentity {
    /// Table name embedded in the record
    Named(String),
    /// No embedded name: stakes plus game format
    Synthesized { stakes: String, format: String },
}

impl fmt::Display for TableIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Synthesized { stakes, format } => write!(f, "{} {}", stakes, format),
        }
    }
}

impl Serialize for TableIdentity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ============================================================================
// Record
// ============================================================================

/// A single hand as produced by the parsing collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Hand identifier as written in the text
    pub id: String,
    /// Embedded table name, if the text carries one
    pub table_name: Option<String>,
    /// Stakes label, e.g. `"$0.05/$0.10"`
    pub stakes: String,
    /// Game format label, e.g. `"6-max NLHE"`
    pub format: String,
    /// Maximum seats at the table
    pub table_size: u8,
    /// Seat holding the dealer button
    pub button_seat: u8,
    /// Occupied seats in seat order
    pub seats: Vec<Seat>,
    /// Action log in hand order
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Self participant's hole cards
    #[serde(default)]
    pub hole_cards: Vec<Card>,
    /// Community cards
    #[serde(default)]
    pub board: Vec<Card>,
    /// Raw text body of the hand
    #[serde(default)]
    pub raw_text: String,
}

impl Record {
    pub fn table_identity(&self) -> TableIdentity {
        match self.table_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => TableIdentity::Named(name.to_string()),
            _ => TableIdentity::Synthesized {
                stakes: self.stakes.trim().to_string(),
                format: self.format.trim().to_string(),
            },
        }
    }

    pub fn seat(&self, number: u8) -> Option<&Seat> {
        self.seats.iter().find(|s| s.number == number)
    }

    pub fn seat_of(&self, player_id: &str) -> Option<u8> {
        self.seats
            .iter()
            .find(|s| s.player_id == player_id)
            .map(|s| s.number)
    }

    pub fn self_seat(&self) -> Option<&Seat> {
        self.seats.iter().find(|s| s.is_self())
    }

    pub fn participant_count(&self) -> usize {
        self.seats.len()
    }

    /// Seat holding `role`
    ///
    /// The button comes from the stored button seat. Blinds come from the first
    /// matching post in the action log, or from the raw text when the log is empty.
    pub fn seat_for_role(&self, role: Role) -> Option<u8> {
        let kind = match role {
            Role::Button => return self.seat(self.button_seat).map(|s| s.number),
            Role::SmallBlind => ActionKind::PostSmallBlind,
            Role::BigBlind => ActionKind::PostBigBlind,
        };

        let poster = if self.actions.is_empty() {
            self.scan_raw_text(kind)
        } else {
            self.actions
                .iter()
                .find(|a| a.kind == kind)
                .map(|a| a.player_id.clone())
        };

        poster.and_then(|player| self.seat_of(&player))
    }

    fn scan_raw_text(&self, kind: ActionKind) -> Option<String> {
        let needle = match kind {
            ActionKind::PostSmallBlind => ": posts small blind",
            ActionKind::PostBigBlind => ": posts big blind",
            ActionKind::Other => return None,
        };

        self.raw_text.lines().find_map(|line| {
            line.find(needle)
                .map(|idx| line[..idx].trim().to_string())
                .filter(|player| !player.is_empty())
        })
    }

    /// Identifiers that look like real names rather than anonymized tokens
    pub fn plain_identifiers(&self) -> impl Iterator<Item = &str> {
        self.seats
            .iter()
            .filter(|s| !s.is_self() && !looks_anonymized(&s.player_id))
            .map(|s| s.player_id.as_str())
    }

    /// Check the structural invariants the parsing collaborator promises
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.table_size < 2 {
            return Err(format!("table size {} below 2", self.table_size));
        }

        let mut seen_numbers = Vec::with_capacity(self.seats.len());
        let mut seen_ids: Vec<&str> = Vec::with_capacity(self.seats.len());
        let mut self_markers = 0;

        for seat in &self.seats {
            if seat.number == 0 || seat.number > self.table_size {
                return Err(format!(
                    "seat {} outside 1..={}",
                    seat.number, self.table_size
                ));
            }
            if seen_numbers.contains(&seat.number) {
                return Err(format!("seat {} listed twice", seat.number));
            }
            if seen_ids.contains(&seat.player_id.as_str()) {
                return Err(format!("identifier {} seated twice", seat.player_id));
            }
            if seat.is_self() {
                self_markers += 1;
            }
            seen_numbers.push(seat.number);
            seen_ids.push(&seat.player_id);
        }

        if self_markers > 1 {
            return Err(format!("{} self markers", self_markers));
        }

        Ok(())
    }
}

/// Anonymized identifiers are short hexadecimal tokens
pub fn looks_anonymized(id: &str) -> bool {
    (6..=8).contains(&id.len()) && id.chars().all(|c| c.is_ascii_hexdigit())
}

// ============================================================================
// Seat mapping
// ============================================================================

/// How a seat mapping was derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    RoleBased,
    Positional,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeatAssignment {
    pub seat: u8,
    pub player_id: String,
    pub name: String,
}

/// Identifier → real name for one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeatMapping {
    pub record_id: String,
    pub strategy: ResolutionStrategy,
    assignments: Vec<SeatAssignment>,
}

impl SeatMapping {
    pub fn new(
        record_id: impl Into<String>,
        strategy: ResolutionStrategy,
        mut assignments: Vec<SeatAssignment>,
    ) -> Self {
        assignments.sort_by_key(|a| a.seat);
        Self {
            record_id: record_id.into(),
            strategy,
            assignments,
        }
    }

    pub fn assignments(&self) -> &[SeatAssignment] {
        &self.assignments
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn name_for(&self, player_id: &str) -> Option<&str> {
        self.assignments
            .iter()
            .find(|a| a.player_id == player_id)
            .map(|a| a.name.as_str())
    }

    pub fn name_for_seat(&self, seat: u8) -> Option<&str> {
        self.assignments
            .iter()
            .find(|a| a.seat == seat)
            .map(|a| a.name.as_str())
    }

    pub fn by_seat(&self) -> BTreeMap<u8, &str> {
        self.assignments
            .iter()
            .map(|a| (a.seat, a.name.as_str()))
            .collect()
    }

    pub fn to_id_map(&self) -> BTreeMap<String, String> {
        self.assignments
            .iter()
            .map(|a| (a.player_id.clone(), a.name.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        Record {
            id: "RC100".to_string(),
            table_name: None,
            stakes: "$0.05/$0.10".to_string(),
            format: "6-max".to_string(),
            table_size: 6,
            button_seat: 3,
            seats: vec![
                Seat::new(1, SELF_MARKER, 10.0),
                Seat::new(2, "a1b2c3", 12.5),
                Seat::new(3, "d4e5f6", 8.0),
            ],
            actions: vec![],
            hole_cards: vec![],
            board: vec![],
            raw_text: "Hero: posts small blind $0.05\na1b2c3: posts big blind $0.10\n".to_string(),
        }
    }

    #[test]
    fn test_card_parse_variants() {
        assert_eq!(Card::parse("As").unwrap().as_str(), "As");
        assert_eq!(Card::parse("10h").unwrap().as_str(), "Th");
        assert_eq!(Card::parse("kD").unwrap().as_str(), "Kd");
        assert_eq!(Card::parse("Q♣").unwrap().as_str(), "Qc");
        assert!(Card::parse("1s").is_none());
        assert!(Card::parse("A").is_none());
        assert!(Card::parse("Ax").is_none());
    }

    #[test]
    fn test_table_identity_fallback() {
        let mut rec = record();
        assert_eq!(rec.table_identity().to_string(), "$0.05/$0.10 6-max");

        rec.table_name = Some("  ".to_string());
        assert!(matches!(rec.table_identity(), TableIdentity::Synthesized { .. }));

        rec.table_name = Some("Rush #42".to_string());
        assert_eq!(rec.table_identity(), TableIdentity::Named("Rush #42".to_string()));
    }

    #[test]
    fn test_blind_seats_from_raw_text() {
        let rec = record();
        assert_eq!(rec.seat_for_role(Role::SmallBlind), Some(1));
        assert_eq!(rec.seat_for_role(Role::BigBlind), Some(2));
        assert_eq!(rec.seat_for_role(Role::Button), Some(3));
    }

    #[test]
    fn test_action_log_preferred_over_raw_text() {
        let mut rec = record();
        rec.actions = vec![
            Action::new("d4e5f6", ActionKind::PostSmallBlind),
            Action::new(SELF_MARKER, ActionKind::PostBigBlind),
            Action::new("a1b2c3", ActionKind::PostBigBlind),
        ];
        assert_eq!(rec.seat_for_role(Role::SmallBlind), Some(3));
        assert_eq!(rec.seat_for_role(Role::BigBlind), Some(1));
    }

    #[test]
    fn test_invariants() {
        let mut rec = record();
        assert!(rec.check_invariants().is_ok());

        rec.seats.push(Seat::new(2, "ffffff", 1.0));
        assert!(rec.check_invariants().is_err());

        let mut rec = record();
        rec.seats.push(Seat::new(4, SELF_MARKER, 1.0));
        assert!(rec.check_invariants().is_err());

        let mut rec = record();
        rec.seats.push(Seat::new(7, "ffffff", 1.0));
        assert!(rec.check_invariants().is_err());
    }

    #[test]
    fn test_looks_anonymized() {
        assert!(looks_anonymized("a1b2c3"));
        assert!(looks_anonymized("5641b4a0"));
        assert!(!looks_anonymized("Gyodong22"));
        assert!(!looks_anonymized(SELF_MARKER));
    }

    #[test]
    fn test_mapping_sorted_by_seat() {
        let mapping = SeatMapping::new(
            "RC100",
            ResolutionStrategy::RoleBased,
            vec![
                SeatAssignment { seat: 3, player_id: "d4e5f6".into(), name: "C".into() },
                SeatAssignment { seat: 1, player_id: SELF_MARKER.into(), name: "A".into() },
            ],
        );
        assert_eq!(mapping.assignments()[0].seat, 1);
        assert_eq!(mapping.name_for("d4e5f6"), Some("C"));
        assert_eq!(mapping.name_for_seat(1), Some("A"));
    }
}
