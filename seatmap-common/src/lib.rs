//! # Seatmap Common Library
//!
//! Shared code for the seatmap workspace:
//! - Error types
//! - TOML configuration loading and resolution
//! - Logging setup
//! - Engine event types and the event bus used as the audit sink

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
