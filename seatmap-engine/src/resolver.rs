//! Seat-mapping resolution
//!
//! Turns one record plus the detail-pass payload of its confirmed evidence into
//! an identifier → real name mapping.
//!
//! # Strategies
//! 1. **Role-based** (preferred): the evidence names the button, small blind
//!    and big blind holders; the record says which seats hold those roles.
//! 2. **Positional** (fallback): the self participant sits at visual
//!    position 1; other participants are rotated onto real seats with
//!    [`rotate_seat`].
//!
//! Whatever the strategy, a mapping that gives one name to two identifiers is
//! rejected as a whole. A wrong mapping is worse than none.

use crate::recognition::DetailPayload;
use crate::types::{Record, ResolutionStrategy, Role, SeatAssignment, SeatMapping};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// Real seat for clockwise visual position `position` (1-indexed, 1 = anchor)
///
/// `((anchor + position - 2) mod table_size) + 1`
pub fn rotate_seat(anchor_seat: u8, position: u8, table_size: u8) -> u8 {
    let n = u32::from(table_size.max(1));
    let offset = u32::from(anchor_seat.max(1)) + u32::from(position.max(1)) - 2;
    // n <= u8::MAX, so the result fits
    ((offset % n) + 1) as u8
}

/// Why a record produced no mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MappingRejection {
    /// Positional inference needs a self seat in the record
    NoAnchor,
    /// A role put a name on the self seat that is not the self name
    SelfNameMismatch {
        seat: u8,
        assigned: String,
        self_name: String,
    },
    /// Two visual positions rotated onto one seat with different names
    SeatCollision { seat: u8, first: String, second: String },
    /// The same name would go to two identifiers
    DuplicateName { name: String, identifiers: Vec<String> },
    /// Nothing could be assigned
    Empty,
}

impl fmt::Display for MappingRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAnchor => write!(f, "no self seat to anchor positions"),
            Self::SelfNameMismatch { seat, assigned, self_name } => write!(
                f,
                "seat {} assigned {:?} but self name is {:?}",
                seat, assigned, self_name
            ),
            Self::SeatCollision { seat, first, second } => {
                write!(f, "seat {} claimed by {:?} and {:?}", seat, first, second)
            }
            Self::DuplicateName { name, identifiers } => {
                write!(f, "name {:?} assigned to {}", name, identifiers.join(", "))
            }
            Self::Empty => write!(f, "empty mapping"),
        }
    }
}

/// Seat-mapping resolver
#[derive(Debug, Clone, Default)]
pub struct SeatMapResolver;

impl SeatMapResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve the identifier → name mapping for one record
    pub fn resolve(
        &self,
        record: &Record,
        detail: &DetailPayload,
    ) -> Result<SeatMapping, MappingRejection> {
        match self.role_based(record, detail) {
            Some(by_seat) => self.finish(record, detail, ResolutionStrategy::RoleBased, by_seat),
            None => self.resolve_positional(record, detail),
        }
    }

    /// Resolve from visual positions only, ignoring role indicators
    ///
    /// Role data names at most four seats, so on a full ring a role-based
    /// mapping can be correct yet too sparse for the seat-stacks gate.
    pub fn resolve_positional(
        &self,
        record: &Record,
        detail: &DetailPayload,
    ) -> Result<SeatMapping, MappingRejection> {
        let by_seat = self.positional(record, detail)?;
        self.finish(record, detail, ResolutionStrategy::Positional, by_seat)
    }

    /// Self-name check, identifier lookup and duplicate check
    fn finish(
        &self,
        record: &Record,
        detail: &DetailPayload,
        strategy: ResolutionStrategy,
        mut by_seat: BTreeMap<u8, String>,
    ) -> Result<SeatMapping, MappingRejection> {
        if let (Some(self_seat), Some(self_name)) = (record.self_seat(), detail.self_name.as_deref())
        {
            match by_seat.get(&self_seat.number) {
                Some(assigned) if assigned != self_name => {
                    return Err(MappingRejection::SelfNameMismatch {
                        seat: self_seat.number,
                        assigned: assigned.clone(),
                        self_name: self_name.to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    by_seat.insert(self_seat.number, self_name.to_string());
                }
            }
        }

        let assignments: Vec<SeatAssignment> = by_seat
            .into_iter()
            .filter_map(|(seat, name)| {
                record.seat(seat).map(|s| SeatAssignment {
                    seat,
                    player_id: s.player_id.clone(),
                    name,
                })
            })
            .collect();

        check_duplicates(&assignments)?;

        if assignments.is_empty() {
            return Err(MappingRejection::Empty);
        }

        debug!(
            record = %record.id,
            strategy = ?strategy,
            seats = assignments.len(),
            "Resolved seat mapping"
        );

        Ok(SeatMapping::new(record.id.clone(), strategy, assignments))
    }

    /// Seat → name from role indicators, or `None` when roles are unusable
    fn role_based(&self, record: &Record, detail: &DetailPayload) -> Option<BTreeMap<u8, String>> {
        if !detail.roles.is_complete() {
            return None;
        }

        let mut by_seat = BTreeMap::new();
        for role in Role::ALL {
            let name = detail.roles.get(role)?;
            let Some(seat) = record.seat_for_role(role) else {
                debug!(record = %record.id, role = role.as_str(), "Role seat not found in record");
                return None;
            };

            match by_seat.get(&seat) {
                Some(existing) if existing != name => {
                    debug!(
                        record = %record.id,
                        seat,
                        existing = %existing,
                        name = %name,
                        "Inconsistent role data, using positional inference"
                    );
                    return None;
                }
                Some(_) => {}
                None => {
                    by_seat.insert(seat, name.to_string());
                }
            }
        }

        Some(by_seat)
    }

    /// Seat → name from visual positions rotated around the self seat
    fn positional(
        &self,
        record: &Record,
        detail: &DetailPayload,
    ) -> Result<BTreeMap<u8, String>, MappingRejection> {
        let anchor = record.self_seat().ok_or(MappingRejection::NoAnchor)?.number;

        let mut by_seat: BTreeMap<u8, String> = BTreeMap::new();
        for player in &detail.players {
            let Some(position) = player.visual_position else {
                continue;
            };
            if position > record.table_size {
                warn!(
                    record = %record.id,
                    name = %player.name,
                    position,
                    table_size = record.table_size,
                    "Visual position beyond table size, skipped"
                );
                continue;
            }

            let seat = rotate_seat(anchor, position, record.table_size);
            if record.seat(seat).is_none() {
                debug!(record = %record.id, name = %player.name, seat, "Position lands on empty seat");
                continue;
            }

            match by_seat.get(&seat) {
                Some(existing) if *existing != player.name => {
                    return Err(MappingRejection::SeatCollision {
                        seat,
                        first: existing.clone(),
                        second: player.name.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    by_seat.insert(seat, player.name.clone());
                }
            }
        }

        Ok(by_seat)
    }
}

fn check_duplicates(assignments: &[SeatAssignment]) -> Result<(), MappingRejection> {
    let mut owners: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for a in assignments {
        owners.entry(a.name.as_str()).or_default().push(a.player_id.clone());
    }

    match owners.into_iter().find(|(_, ids)| ids.len() > 1) {
        Some((name, identifiers)) => Err(MappingRejection::DuplicateName {
            name: name.to_string(),
            identifiers,
        }),
        None => Ok(()),
    }
}
