//! Board configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! write_policy = "rollback-on-failure"
//! notes_quiet_period_ms = 400
//! max_random_attempts = 500
//! seed = 7
//! event_capacity = 256
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use ticketboard_model::numbering::DEFAULT_MAX_ATTEMPTS;

/// Quiet period before a notes edit is persisted
pub const DEFAULT_NOTES_QUIET_PERIOD_MS: u64 = 400;

/// Buffered events per subscriber
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// What happens to the local mirror when a single-entity write fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WritePolicy {
    /// Keep the optimistic local change and surface the error
    #[default]
    OptimisticNoRollback,
    /// Restore the previous local value, then surface the error
    RollbackOnFailure,
}

impl WritePolicy {
    /// Check if failed writes are reverted locally
    #[inline]
    #[must_use]
    pub fn rolls_back(self) -> bool {
        matches!(self, Self::RollbackOnFailure)
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Board configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Failure handling for single-entity writes
    pub write_policy: WritePolicy,
    /// Notes debounce window in milliseconds
    pub notes_quiet_period_ms: u64,
    /// Random draws before numbering falls back to sequential
    pub max_random_attempts: u32,
    /// Fixed seed for random numbering
    pub seed: Option<u64>,
    /// Event channel capacity
    pub event_capacity: usize,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            write_policy: WritePolicy::default(),
            notes_quiet_period_ms: DEFAULT_NOTES_QUIET_PERIOD_MS,
            max_random_attempts: DEFAULT_MAX_ATTEMPTS,
            seed: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl BoardConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set write policy
    #[inline]
    #[must_use]
    pub fn with_write_policy(mut self, policy: WritePolicy) -> Self {
        self.write_policy = policy;
        self
    }

    /// Set notes quiet period
    #[inline]
    #[must_use]
    pub fn with_quiet_period(mut self, period: Duration) -> Self {
        self.notes_quiet_period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Seed random numbering
    #[inline]
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Bound random draws
    #[inline]
    #[must_use]
    pub fn with_max_random_attempts(mut self, attempts: u32) -> Self {
        self.max_random_attempts = attempts;
        self
    }

    /// Notes quiet period as a duration
    #[inline]
    #[must_use]
    pub fn notes_quiet_period(&self) -> Duration {
        Duration::from_millis(self.notes_quiet_period_ms)
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// - `ConfigError::Parse` on malformed TOML or unknown values
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read a TOML file
    ///
    /// # Errors
    /// - `ConfigError::Io` if the file cannot be read
    /// - `ConfigError::Parse` on malformed TOML
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), ?config, "loaded board config");
        Ok(config)
    }
}
