//! Runtime configuration for the sync engine.
//!
//! Configuration is read from a JSON payload or from defaults, then
//! overridden by `CROSSFADE_*` environment variables.
//!
//! ```
//! use crossfade::config::SyncEngineConfig;
//!
//! let config = SyncEngineConfig::from_json_str(r#"{ "chunk_size": 50 }"#)
//!     .expect("valid configuration");
//! assert_eq!(config.chunk_size.get(), 50);
//! assert_eq!(config.history_limit, 20);
//! ```

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::num::NonZeroUsize;
use thiserror::Error;

/// Environment variable overriding [`SyncEngineConfig::chunk_size`].
pub const CHUNK_SIZE_ENV: &str = "CROSSFADE_CHUNK_SIZE";
/// Environment variable overriding [`SyncEngineConfig::stale_after_secs`].
pub const STALE_AFTER_SECS_ENV: &str = "CROSSFADE_STALE_AFTER_SECS";
/// Environment variable overriding [`SyncEngineConfig::history_limit`].
pub const HISTORY_LIMIT_ENV: &str = "CROSSFADE_HISTORY_LIMIT";

const DEFAULT_CHUNK_SIZE: NonZeroUsize = match NonZeroUsize::new(100) {
    Some(size) => size,
    None => NonZeroUsize::MIN,
};
const DEFAULT_STALE_AFTER_SECS: u64 = 600;
const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Tunables for chunk execution, stale task detection and history reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncEngineConfig {
    /// Source items handled by one chunk.
    pub chunk_size: NonZeroUsize,
    /// Seconds without an update after which a non-terminal task is stale.
    pub stale_after_secs: u64,
    /// Default number of tasks returned by history listings.
    pub history_limit: usize,
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            stale_after_secs: DEFAULT_STALE_AFTER_SECS,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl SyncEngineConfig {
    /// Parses and validates a JSON payload. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] for malformed payloads and the
    /// validation errors of [`Self::validate`].
    pub fn from_json_str(payload: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(payload)?;
        config.validate()?;
        Ok(config)
    }

    /// Builds the default configuration overridden by the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is not valid Unicode, does not
    /// parse, or yields an invalid configuration.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| std::env::var_os(key))
    }

    /// Applies overrides looked up by variable name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a value is not valid Unicode, does not
    /// parse, or yields an invalid configuration.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<OsString>,
    ) -> Result<Self, ConfigError> {
        if let Some(chunk_size) = parse_override(&lookup, CHUNK_SIZE_ENV)? {
            self.chunk_size = chunk_size;
        }
        if let Some(stale_after_secs) = parse_override(&lookup, STALE_AFTER_SECS_ENV)? {
            self.stale_after_secs = stale_after_secs;
        }
        if let Some(history_limit) = parse_override(&lookup, HISTORY_LIMIT_ENV)? {
            self.history_limit = history_limit;
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::StaleAfterOutOfRange`] unless the threshold is
    /// positive and representable as a [`TimeDelta`], and
    /// [`ConfigError::ZeroHistoryLimit`] for a zero history limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stale_after_secs == 0 || self.stale_after().is_none() {
            return Err(ConfigError::StaleAfterOutOfRange(self.stale_after_secs));
        }
        if self.history_limit == 0 {
            return Err(ConfigError::ZeroHistoryLimit);
        }
        Ok(())
    }

    /// Returns the staleness threshold, or `None` when it overflows.
    #[must_use]
    pub fn stale_after(&self) -> Option<TimeDelta> {
        i64::try_from(self.stale_after_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
    }
}

fn parse_override<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<OsString>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let value = raw
        .into_string()
        .map_err(|_| ConfigError::NotUnicode(key))?;
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue { key, value })
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The JSON payload could not be decoded.
    #[error("invalid configuration payload: {0}")]
    Json(#[from] serde_json::Error),

    /// An environment variable held non-Unicode data.
    #[error("{0} is not valid unicode")]
    NotUnicode(&'static str),

    /// An environment variable did not parse.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Variable name.
        key: &'static str,
        /// Rejected value.
        value: String,
    },

    /// The staleness threshold is zero or too large.
    #[error("stale_after_secs must be positive and fit a duration, got {0}")]
    StaleAfterOutOfRange(u64),

    /// History listings would always be empty.
    #[error("history_limit must be positive")]
    ZeroHistoryLimit,
}
