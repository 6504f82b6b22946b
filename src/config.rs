//! Analysis configuration
//!
//! Loaded from TOML; every section and key is optional.
//!
//! ```toml
//! [matching]
//! pending_ttl_ns = 5_000_000_000
//!
//! [analysis]
//! cache_capacity = 32
//!
//! [layout]
//! network_send = ["inet_sock_local_out", "my_udp_send"]
//! ```

use crate::error::ConfigError;
use crate::layout::EventLayout;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Pending network endpoint policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Drop unmatched endpoints older than this (relative to the current event)
    ///
    /// `None` keeps them until the end of the trace.
    pub pending_ttl_ns: Option<u64>,

    /// Upper bound of pending endpoints per direction, oldest dropped first
    pub max_pending: Option<usize>,
}

/// Analysis-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Number of critical paths kept in the cache
    pub cache_capacity: usize,

    /// Events on CPUs at or above this number are dropped
    pub cpu_count: Option<u32>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            cache_capacity: 64,
            cpu_count: None,
        }
    }
}

/// Full configuration
///
/// # Example
/// ```
/// use rastro::config::AnalysisConfig;
///
/// let config = AnalysisConfig::from_toml_str("[analysis]\ncache_capacity = 8\n").unwrap();
/// assert_eq!(config.analysis.cache_capacity, 8);
/// assert!(config.matching.pending_ttl_ns.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub layout: EventLayout,
    pub matching: MatchingConfig,
    pub analysis: AnalysisSettings,
}

impl AnalysisConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AnalysisConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.analysis.cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "cache_capacity must be at least 1".to_string(),
            ));
        }

        if self.matching.pending_ttl_ns == Some(0) {
            return Err(ConfigError::Invalid(
                "pending_ttl_ns must be positive when set".to_string(),
            ));
        }

        if self.matching.max_pending == Some(0) {
            return Err(ConfigError::Invalid(
                "max_pending must be positive when set".to_string(),
            ));
        }

        if self.analysis.cpu_count == Some(0) {
            return Err(ConfigError::Invalid(
                "cpu_count must be positive when set".to_string(),
            ));
        }

        self.layout.index().map_err(ConfigError::Invalid)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert_eq!(config.analysis.cache_capacity, 64);
        assert!(config.matching.pending_ttl_ns.is_none());
        assert!(config.matching.max_pending.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = AnalysisConfig::from_toml_str("").unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn test_invalid_cache_capacity() {
        let err = AnalysisConfig::from_toml_str("[analysis]\ncache_capacity = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_invalid_ttl() {
        let err = AnalysisConfig::from_toml_str("[matching]\npending_ttl_ns = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_parse_error() {
        let err = AnalysisConfig::from_toml_str("[analysis\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_layout_conflict_rejected() {
        let err = AnalysisConfig::from_toml_str(
            "[layout]\nwakeup = [\"sched_switch\"]\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("sched_switch")));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[matching]\npending_ttl_ns = 1000\nmax_pending = 16").unwrap();
        let config = AnalysisConfig::from_file(file.path()).unwrap();
        assert_eq!(config.matching.pending_ttl_ns, Some(1000));
        assert_eq!(config.matching.max_pending, Some(16));
    }

    #[test]
    fn test_missing_file() {
        let err = AnalysisConfig::from_file("/nonexistent/rastro.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
