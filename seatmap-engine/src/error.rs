//! Job-fatal engine errors
//!
//! Only configuration problems, input-size ceilings and an unusable
//! recognition backend surface as `Err`. Data-quality outcomes (discards,
//! gate rejections, mapping rejections, merge conflicts) are reported in the
//! engine output instead.

use crate::recognition::RecognitionError;
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Engine settings failed validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input exceeds a hard ceiling; rejected before any recognition call
    #[error("{what} count {count} exceeds limit {limit}")]
    LimitExceeded {
        what: &'static str,
        count: usize,
        limit: usize,
    },

    /// Recognition backend misconfigured or unreachable
    #[error("Recognition backend error: {0}")]
    RecognitionBackend(#[from] RecognitionError),

    #[error(transparent)]
    Common(#[from] seatmap_common::Error),
}
