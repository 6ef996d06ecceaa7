//! Typed engine settings
//!
//! Built from the bootstrap [`TomlConfig`] plus environment overrides, then
//! validated once so the orchestrator never sees a zero ceiling.

use crate::error::{EngineError, EngineResult};
use seatmap_common::config::TomlConfig;
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable carrying the recognition API key
pub const API_KEY_ENV: &str = "SEATMAP_RECOGNITION_API_KEY";

/// Caller tier; selects the concurrency ceiling for a job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CallerTier {
    #[default]
    Standard,
    Priority,
}

impl CallerTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Priority => "priority",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionSettings {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    /// Per-call timeout, applied by the HTTP client and by the orchestrator
    pub timeout: Duration,
    pub requests_per_second: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub recognition: RecognitionSettings,
    pub standard_concurrency: usize,
    pub priority_concurrency: usize,
    /// Fixed delay before the single identity retry
    pub identity_retry_backoff: Duration,
    pub max_records: usize,
    pub max_evidence: usize,
    /// Minimum fallback score (0..=100) for a candidate
    pub fallback_threshold: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            recognition: RecognitionSettings {
                endpoint: None,
                api_key: None,
                timeout: Duration::from_secs(30),
                requests_per_second: 10,
            },
            standard_concurrency: 3,
            priority_concurrency: 10,
            identity_retry_backoff: Duration::from_secs(1),
            max_records: 10_000,
            max_evidence: 500,
            fallback_threshold: 70,
        }
    }
}

impl EngineConfig {
    /// Build engine settings from the bootstrap config
    ///
    /// The API key comes from [`API_KEY_ENV`] when set, otherwise from TOML.
    pub fn from_toml(toml: &TomlConfig) -> EngineResult<Self> {
        let api_key = resolve_api_key(
            std::env::var(API_KEY_ENV).ok().as_deref(),
            toml.recognition.api_key.as_deref(),
        );

        let config = Self {
            recognition: RecognitionSettings {
                endpoint: toml.recognition.endpoint.clone(),
                api_key,
                timeout: Duration::from_millis(toml.recognition.timeout_ms),
                requests_per_second: toml.recognition.requests_per_second,
            },
            standard_concurrency: toml.concurrency.standard,
            priority_concurrency: toml.concurrency.priority,
            identity_retry_backoff: Duration::from_millis(
                toml.concurrency.identity_retry_backoff_ms,
            ),
            max_records: toml.limits.max_records,
            max_evidence: toml.limits.max_evidence,
            fallback_threshold: toml.matching.fallback_threshold,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EngineResult<()> {
        let zero_checks = [
            ("concurrency.standard", self.standard_concurrency),
            ("concurrency.priority", self.priority_concurrency),
            ("limits.max_records", self.max_records),
            ("limits.max_evidence", self.max_evidence),
        ];
        for (field, value) in zero_checks {
            if value == 0 {
                return Err(EngineError::Config(format!("{} must be at least 1", field)));
            }
        }

        if self.recognition.timeout.is_zero() {
            return Err(EngineError::Config(
                "recognition.timeout_ms must be at least 1".to_string(),
            ));
        }
        if self.fallback_threshold > 100 {
            return Err(EngineError::Config(format!(
                "matching.fallback_threshold {} exceeds 100",
                self.fallback_threshold
            )));
        }

        Ok(())
    }

    pub fn concurrency_for(&self, tier: CallerTier) -> usize {
        match tier {
            CallerTier::Standard => self.standard_concurrency,
            CallerTier::Priority => self.priority_concurrency,
        }
    }
}

fn usable(key: Option<&str>) -> Option<&str> {
    key.map(str::trim).filter(|k| !k.is_empty())
}

/// Pick the API key: environment first, then TOML
fn resolve_api_key(env_key: Option<&str>, toml_key: Option<&str>) -> Option<String> {
    let env_key = usable(env_key);
    let toml_key = usable(toml_key);

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "Recognition API key found in multiple sources: environment, TOML. Using environment."
        );
    }

    if let Some(key) = env_key {
        info!("Recognition API key loaded from environment variable");
        return Some(key.to_string());
    }
    if let Some(key) = toml_key {
        info!("Recognition API key loaded from TOML config");
        return Some(key.to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults_match_toml_defaults() {
        let config = EngineConfig::from_toml(&TomlConfig::default()).unwrap();
        let defaults = EngineConfig::default();

        assert_eq!(config.standard_concurrency, defaults.standard_concurrency);
        assert_eq!(config.priority_concurrency, defaults.priority_concurrency);
        assert_eq!(config.identity_retry_backoff, defaults.identity_retry_backoff);
        assert_eq!(config.fallback_threshold, 70);
    }

    #[test]
    fn test_zero_ceiling_rejected() {
        let mut toml = TomlConfig::default();
        toml.concurrency.priority = 0;
        assert!(matches!(
            EngineConfig::from_toml(&toml),
            Err(EngineError::Config(_))
        ));

        let mut toml = TomlConfig::default();
        toml.limits.max_evidence = 0;
        assert!(EngineConfig::from_toml(&toml).is_err());
    }

    #[test]
    fn test_tier_ceilings() {
        let config = EngineConfig::default();
        assert_eq!(config.concurrency_for(CallerTier::Standard), 3);
        assert_eq!(config.concurrency_for(CallerTier::Priority), 10);
    }

    #[test]
    fn test_api_key_priority() {
        assert_eq!(resolve_api_key(Some("env"), Some("toml")).as_deref(), Some("env"));
        assert_eq!(resolve_api_key(Some("  "), Some("toml")).as_deref(), Some("toml"));
        assert_eq!(resolve_api_key(None, None), None);
    }

    #[test]
    #[serial]
    fn test_api_key_from_environment() {
        let mut toml = TomlConfig::default();
        toml.recognition.api_key = Some("from-toml".to_string());

        std::env::set_var(API_KEY_ENV, "from-env");
        let config = EngineConfig::from_toml(&toml).unwrap();
        std::env::remove_var(API_KEY_ENV);

        assert_eq!(config.recognition.api_key.as_deref(), Some("from-env"));

        let config = EngineConfig::from_toml(&toml).unwrap();
        assert_eq!(config.recognition.api_key.as_deref(), Some("from-toml"));
    }
}
