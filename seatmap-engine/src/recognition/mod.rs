//! Recognition collaborator boundary
//!
//! The external service is reached through the [`Recognizer`] trait, one
//! method per pass. Ordinary recognition failure is a value
//! (`IdentityResult::Failure` / `DetailResult::Failure`); only
//! [`RecognitionError`] (misconfiguration, unreachable backend) aborts a job.
//!
//! Raw service payloads are validated in [`payload`] before anything else
//! sees them.

pub mod http_client;
pub mod payload;

pub use http_client::HttpRecognizer;
pub use payload::{RawDetailPayload, RawIdentityPayload};

use crate::evidence::EvidenceImage;
use crate::types::{Card, Role};
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Job-fatal recognition backend errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecognitionError {
    /// Backend rejected our configuration (missing endpoint, bad credentials)
    #[error("recognition backend misconfigured: {0}")]
    Configuration(String),

    /// Backend could not be reached at all
    #[error("recognition backend unavailable: {0}")]
    Unavailable(String),
}

// ============================================================================
// Identity pass
// ============================================================================

/// Optional signals read during the identity pass, used only by fallback scoring
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchHints {
    pub hole_cards: Vec<Card>,
    pub board: Vec<Card>,
    pub names: Vec<String>,
    pub self_stack: Option<f64>,
    /// 1-indexed visual position of the dealer button (1 = self anchor)
    pub button_position: Option<u8>,
}

impl MatchHints {
    pub fn is_empty(&self) -> bool {
        self.hole_cards.is_empty()
            && self.board.is_empty()
            && self.names.is_empty()
            && self.self_stack.is_none()
            && self.button_position.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityPayload {
    /// Hand identifier as read from the screenshot
    pub identifier: Option<String>,
    pub hints: MatchHints,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IdentityResult {
    Success(IdentityPayload),
    Failure { reason: String },
}

// ============================================================================
// Detail pass
// ============================================================================

/// Names the screenshot associates with each role
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoleIndicators {
    pub button: Option<String>,
    pub small_blind: Option<String>,
    pub big_blind: Option<String>,
}

impl RoleIndicators {
    pub fn get(&self, role: Role) -> Option<&str> {
        match role {
            Role::Button => self.button.as_deref(),
            Role::SmallBlind => self.small_blind.as_deref(),
            Role::BigBlind => self.big_blind.as_deref(),
        }
    }

    pub fn is_complete(&self) -> bool {
        Role::ALL.iter().all(|r| self.get(*r).is_some())
    }

    pub fn is_empty(&self) -> bool {
        Role::ALL.iter().all(|r| self.get(*r).is_none())
    }
}

/// One participant as rendered on the screenshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedPlayer {
    pub name: String,
    pub stack: Option<f64>,
    /// 1-indexed clockwise visual position, 1 = self anchor
    pub visual_position: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailPayload {
    pub players: Vec<DetectedPlayer>,
    pub self_name: Option<String>,
    pub roles: RoleIndicators,
}

impl DetailPayload {
    pub fn participant_count(&self) -> usize {
        self.players.len()
    }

    /// Stack shown next to `name`, first occurrence
    pub fn stack_of(&self, name: &str) -> Option<f64> {
        self.players
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.stack)
    }

    pub fn self_stack(&self) -> Option<f64> {
        self.self_name.as_deref().and_then(|n| self.stack_of(n))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetailResult {
    Success(DetailPayload),
    Failure { reason: String },
}

// ============================================================================
// Recognizer trait
// ============================================================================

/// External recognition collaborator
///
/// Both operations are independent and may be called concurrently.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Cheap, high-precision pass: hand identifier plus optional match hints
    async fn recognize_identity(
        &self,
        image: &EvidenceImage,
    ) -> Result<IdentityResult, RecognitionError>;

    /// Full pass: participants, stacks, positions and role indicators
    async fn recognize_details(
        &self,
        image: &EvidenceImage,
    ) -> Result<DetailResult, RecognitionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_indicator_completeness() {
        let mut roles = RoleIndicators::default();
        assert!(roles.is_empty());
        assert!(!roles.is_complete());

        roles.button = Some("Gyodong22".to_string());
        roles.small_blind = Some("Hero".to_string());
        assert!(!roles.is_complete());
        assert!(!roles.is_empty());

        roles.big_blind = Some("v1nn1".to_string());
        assert!(roles.is_complete());
        assert_eq!(roles.get(Role::SmallBlind), Some("Hero"));
    }

    #[test]
    fn test_self_stack_lookup() {
        let payload = DetailPayload {
            players: vec![
                DetectedPlayer { name: "Hero".into(), stack: Some(10.0), visual_position: Some(1) },
                DetectedPlayer { name: "v1nn1".into(), stack: None, visual_position: Some(2) },
            ],
            self_name: Some("Hero".into()),
            roles: RoleIndicators::default(),
        };
        assert_eq!(payload.self_stack(), Some(10.0));
        assert_eq!(payload.stack_of("v1nn1"), None);
        assert_eq!(payload.participant_count(), 2);
    }
}
