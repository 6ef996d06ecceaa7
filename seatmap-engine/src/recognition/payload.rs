//! Raw recognition service payloads and their boundary validation
//!
//! The service answers with loosely-typed JSON. Everything downstream works on
//! [`IdentityPayload`] / [`DetailPayload`], so validation happens exactly once,
//! here. A payload that fails validation is an ordinary recognition failure.

use super::{
    DetailPayload, DetailResult, DetectedPlayer, IdentityPayload, IdentityResult, MatchHints,
    RoleIndicators,
};
use crate::types::Card;
use serde::Deserialize;

/// Prefix of every validation failure reason
pub const INVALID_PAYLOAD: &str = "invalid_payload";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawHints {
    #[serde(default)]
    pub hole_cards: Vec<String>,
    #[serde(default)]
    pub board: Vec<String>,
    #[serde(default)]
    pub names: Vec<String>,
    pub self_stack: Option<f64>,
    pub button_position: Option<u8>,
}

/// Identity-pass response body
#[derive(Debug, Clone, Deserialize)]
pub struct RawIdentityPayload {
    pub success: bool,
    pub identifier: Option<String>,
    #[serde(default)]
    pub hints: Option<RawHints>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPlayer {
    pub name: String,
    pub stack: Option<f64>,
    pub position: Option<u8>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRoles {
    pub button: Option<String>,
    pub small_blind: Option<String>,
    pub big_blind: Option<String>,
}

/// Detail-pass response body
#[derive(Debug, Clone, Deserialize)]
pub struct RawDetailPayload {
    pub success: bool,
    #[serde(default)]
    pub players: Vec<RawPlayer>,
    pub self_name: Option<String>,
    #[serde(default)]
    pub roles: RawRoles,
    pub error: Option<String>,
}

fn invalid(detail: impl std::fmt::Display) -> String {
    format!("{}: {}", INVALID_PAYLOAD, detail)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_cards(raw: &[String], field: &str) -> Result<Vec<Card>, String> {
    raw.iter()
        .map(|c| Card::parse(c).ok_or_else(|| invalid(format!("bad card {:?} in {}", c, field))))
        .collect()
}

fn check_stack(stack: Option<f64>, owner: &str) -> Result<Option<f64>, String> {
    match stack {
        Some(s) if !s.is_finite() || s < 0.0 => {
            Err(invalid(format!("stack {} for {} is not a valid amount", s, owner)))
        }
        other => Ok(other),
    }
}

impl RawIdentityPayload {
    pub fn validate(self) -> IdentityResult {
        if !self.success {
            return IdentityResult::Failure {
                reason: self.error.unwrap_or_else(|| "recognition_failed".to_string()),
            };
        }

        match self.validate_success() {
            Ok(payload) => IdentityResult::Success(payload),
            Err(reason) => IdentityResult::Failure { reason },
        }
    }

    fn validate_success(self) -> Result<IdentityPayload, String> {
        let identifier = non_blank(self.identifier);
        let hints = match self.hints {
            Some(raw) => MatchHints {
                hole_cards: parse_cards(&raw.hole_cards, "hole_cards")?,
                board: parse_cards(&raw.board, "board")?,
                names: raw
                    .names
                    .into_iter()
                    .filter_map(|n| non_blank(Some(n)))
                    .collect(),
                self_stack: check_stack(raw.self_stack, "self")?,
                button_position: match raw.button_position {
                    Some(0) => return Err(invalid("button_position is 1-indexed")),
                    other => other,
                },
            },
            None => MatchHints::default(),
        };

        if identifier.is_none() && hints.is_empty() {
            return Err(invalid("no identifier and no hints"));
        }

        Ok(IdentityPayload { identifier, hints })
    }
}

impl RawDetailPayload {
    pub fn validate(self) -> DetailResult {
        if !self.success {
            return DetailResult::Failure {
                reason: self.error.unwrap_or_else(|| "recognition_failed".to_string()),
            };
        }

        match self.validate_success() {
            Ok(payload) => DetailResult::Success(payload),
            Err(reason) => DetailResult::Failure { reason },
        }
    }

    fn validate_success(self) -> Result<DetailPayload, String> {
        if self.players.is_empty() {
            return Err(invalid("no participants"));
        }

        let mut players = Vec::with_capacity(self.players.len());
        for raw in self.players {
            let name = raw.name.trim().to_string();
            if name.is_empty() {
                return Err(invalid("blank participant name"));
            }
            if raw.position == Some(0) {
                return Err(invalid(format!("position 0 for {}", name)));
            }
            let stack = check_stack(raw.stack, &name)?;
            players.push(DetectedPlayer {
                name,
                stack,
                visual_position: raw.position,
            });
        }

        // Positions and stacks are all-or-nothing across participants
        let positioned = players.iter().filter(|p| p.visual_position.is_some()).count();
        if positioned != 0 && positioned != players.len() {
            return Err(invalid(format!(
                "{} positions for {} participants",
                positioned,
                players.len()
            )));
        }
        let stacked = players.iter().filter(|p| p.stack.is_some()).count();
        if stacked != 0 && stacked != players.len() {
            return Err(invalid(format!(
                "{} stacks for {} participants",
                stacked,
                players.len()
            )));
        }

        Ok(DetailPayload {
            players,
            self_name: non_blank(self.self_name),
            roles: RoleIndicators {
                button: non_blank(self.roles.button),
                small_blind: non_blank(self.roles.small_blind),
                big_blind: non_blank(self.roles.big_blind),
            },
        })
    }
}
