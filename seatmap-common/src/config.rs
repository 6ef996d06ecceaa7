//! Configuration loading and config file resolution
//!
//! Bootstrap configuration is read from a single TOML file. Every field has a
//! built-in default, so a missing file or a missing section is never fatal.
//!
//! # Config file resolution priority
//!
//! 1. Explicit path supplied by the caller (highest priority)
//! 2. `SEATMAP_CONFIG` environment variable
//! 3. User config directory: `<config_dir>/seatmap/seatmap.toml`
//! 4. Built-in defaults (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "SEATMAP_CONFIG";

/// File name looked up inside the user config directory
pub const CONFIG_FILE_NAME: &str = "seatmap.toml";

/// Complete bootstrap configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// External recognition service
    #[serde(default)]
    pub recognition: RecognitionConfig,

    /// Concurrency ceilings and retry timing
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    /// Hard input-size ceilings
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Matching thresholds
    #[serde(default)]
    pub matching: MatchingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Recognition service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionConfig {
    /// Base URL of the recognition service
    #[serde(default)]
    pub endpoint: Option<String>,

    /// API key (the environment variable takes priority, see engine config)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-call timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Client-side rate limit
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_ms: default_timeout_ms(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

/// Concurrency configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Concurrent recognition calls for standard callers
    #[serde(default = "default_standard_ceiling")]
    pub standard: usize,

    /// Concurrent recognition calls for priority callers
    #[serde(default = "default_priority_ceiling")]
    pub priority: usize,

    /// Fixed delay before the single identity-pass retry
    #[serde(default = "default_retry_backoff_ms")]
    pub identity_retry_backoff_ms: u64,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            standard: default_standard_ceiling(),
            priority: default_priority_ceiling(),
            identity_retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Input-size ceilings checked before a job starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_records")]
    pub max_records: usize,

    #[serde(default = "default_max_evidence")]
    pub max_evidence: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_records: default_max_records(),
            max_evidence: default_max_evidence(),
        }
    }
}

/// Matching thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Minimum fallback score (out of 100) for a candidate to be proposed
    #[serde(default = "default_fallback_threshold")]
    pub fallback_threshold: u32,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            fallback_threshold: default_fallback_threshold(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_requests_per_second() -> u32 {
    10
}

fn default_standard_ceiling() -> usize {
    3
}

fn default_priority_ceiling() -> usize {
    10
}

fn default_retry_backoff_ms() -> u64 {
    1_000
}

fn default_max_records() -> usize {
    10_000
}

fn default_max_evidence() -> usize {
    500
}

fn default_fallback_threshold() -> u32 {
    70
}

/// Config file resolver following the priority order in the module docs
pub struct ConfigResolver {
    explicit_path: Option<PathBuf>,
}

impl ConfigResolver {
    /// Create resolver, optionally with a caller-supplied path
    pub fn new(explicit_path: Option<PathBuf>) -> Self {
        Self { explicit_path }
    }

    /// Locate the config file to use, if any
    ///
    /// Returns `None` when no candidate exists; callers fall back to defaults.
    pub fn locate(&self) -> Option<PathBuf> {
        if let Some(path) = &self.explicit_path {
            return Some(path.clone());
        }

        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        let user_config = dirs::config_dir().map(|d| d.join("seatmap").join(CONFIG_FILE_NAME));
        match user_config {
            Some(path) if path.exists() => Some(path),
            _ => None,
        }
    }

    /// Resolve and load configuration
    ///
    /// An explicitly named file (argument or environment) must exist and parse.
    /// The implicit user config file is optional: absence yields defaults.
    pub fn resolve(&self) -> Result<TomlConfig> {
        let explicit = self.explicit_path.is_some()
            || std::env::var(CONFIG_PATH_ENV)
                .map(|p| !p.trim().is_empty())
                .unwrap_or(false);

        match self.locate() {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                load_toml_config(&path)
            }
            Some(path) if explicit => Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            ))),
            _ => {
                warn!("No configuration file found, using built-in defaults");
                Ok(TomlConfig::default())
            }
        }
    }
}

/// Load a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)?;
    debug!(path = %path.display(), "Configuration parsed");
    Ok(config)
}

/// Write a TOML config file, replacing it atomically via a temp file
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
