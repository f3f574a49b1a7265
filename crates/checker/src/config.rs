//! Checker configuration, read from TOML.
//!
//! Every field has a default, so an empty file is a valid config.
//!
//! ```toml
//! [checker]
//! max_batch_size = 1000
//! max_output_states = 10000
//!
//! [retry]
//! max_attempts = 3
//! backoff_ms = 10
//!
//! [store]
//! kind = "journal"
//! journal_path = "/var/lib/notary/journal"
//! sync = true
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    pub checker: CheckerSettings,
    pub retry: RetrySettings,
    pub store: StoreSettings,
}

/// `[checker]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerSettings {
    /// Requests handled in one backing-store transaction.
    pub max_batch_size: usize,
    /// Largest `num_output_states` accepted. Larger requests fail as
    /// malformed before any output is allocated.
    pub max_output_states: u32,
}

impl Default for CheckerSettings {
    fn default() -> Self {
        CheckerSettings {
            max_batch_size: 1000,
            max_output_states: 10_000,
        }
    }
}

/// `[retry]` section, for transient store failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total tries, including the first.
    pub max_attempts: u32,
    /// Backoff before try `n + 1` is `n * backoff_ms`.
    pub backoff_ms: u64,
}

impl RetrySettings {
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(u64::from(attempt)))
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_attempts: 3,
            backoff_ms: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    Journal,
}

/// `[store]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub kind: StoreKind,
    /// Journal directory, one segment file per holding identity. Required
    /// when `kind = "journal"`.
    pub journal_path: Option<PathBuf>,
    /// fsync every committed journal entry.
    pub sync: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            kind: StoreKind::Memory,
            journal_path: None,
            sync: true,
        }
    }
}

// ── Functions ─────────────────────────────────────────────────────────────────

impl CheckerConfig {
    /// Read, parse and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: CheckerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.checker.max_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "checker.max_batch_size must be at least 1".to_string(),
            ));
        }
        if self.checker.max_output_states == 0 {
            return Err(ConfigError::Invalid(
                "checker.max_output_states must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.store.kind == StoreKind::Journal && self.store.journal_path.is_none() {
            return Err(ConfigError::Invalid(
                "store.journal_path is required when store.kind = \"journal\"".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = CheckerConfig::from_toml_str("").unwrap();
        assert_eq!(config, CheckerConfig::default());
        assert_eq!(config.checker.max_batch_size, 1000);
        assert_eq!(config.checker.max_output_states, 10_000);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.store.kind, StoreKind::Memory);
        assert!(config.store.sync);
    }

    #[test]
    fn parses_journal_store() {
        let config = CheckerConfig::from_toml_str(
            r#"
            [checker]
            max_batch_size = 50
            max_output_states = 16

            [store]
            kind = "journal"
            journal_path = "/tmp/notary.journal"
            sync = false
            "#,
        )
        .unwrap();
        assert_eq!(config.checker.max_batch_size, 50);
        assert_eq!(config.checker.max_output_states, 16);
        assert_eq!(config.store.kind, StoreKind::Journal);
        assert_eq!(
            config.store.journal_path.as_deref(),
            Some(Path::new("/tmp/notary.journal"))
        );
        assert!(!config.store.sync);
        assert_eq!(config.retry, RetrySettings::default());
    }

    #[test]
    fn journal_without_path_is_invalid() {
        let err = CheckerConfig::from_toml_str("[store]\nkind = \"journal\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{err}");
    }

    #[test]
    fn zero_limits_are_invalid() {
        assert!(matches!(
            CheckerConfig::from_toml_str("[checker]\nmax_batch_size = 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            CheckerConfig::from_toml_str("[checker]\nmax_output_states = 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            CheckerConfig::from_toml_str("[retry]\nmax_attempts = 0\n"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn unknown_store_kind_is_a_parse_error() {
        let err = CheckerConfig::from_toml_str("[store]\nkind = \"postgres\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "{err}");
    }

    #[test]
    fn backoff_is_linear() {
        let retry = RetrySettings {
            max_attempts: 5,
            backoff_ms: 20,
        };
        assert_eq!(retry.backoff(1), Duration::from_millis(20));
        assert_eq!(retry.backoff(3), Duration::from_millis(60));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = CheckerConfig::load(Path::new("/nonexistent/notary.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
