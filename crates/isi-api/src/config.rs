//! Tool configuration.
//!
//! Settings come from an optional TOML file; every field has a default so an
//! empty or missing file is valid. Command-line flags override file values.
//!
//! ```toml
//! port = 8080
//! scheme = "https"
//! credentials_file = "creds.json"
//! log_file = "isi_tools.log"
//! poll_interval_secs = 10
//! poll_max_attempts = 10
//! lock_comment = "held for audit"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::jobs::{DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL, PollPolicy};
use crate::locks::DEFAULT_LOCK_COMMENT;
use crate::session::{DEFAULT_PORT, Scheme};

/// File consulted when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "isi-tools.toml";

/// Default credential record location.
pub const DEFAULT_CREDENTIALS_FILE: &str = "creds.json";

/// Settings shared by every tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    /// Management API port.
    pub port: u16,
    /// URI scheme.
    pub scheme: Scheme,
    /// Credential record path.
    pub credentials_file: PathBuf,
    /// Append request audit log here when set.
    pub log_file: Option<PathBuf>,
    /// Seconds between job status queries.
    pub poll_interval_secs: u64,
    /// Non-terminal job observations before giving up.
    pub poll_max_attempts: u32,
    /// Comment stamped on new snapshot locks.
    pub lock_comment: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            scheme: Scheme::Https,
            credentials_file: PathBuf::from(DEFAULT_CREDENTIALS_FILE),
            log_file: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            poll_max_attempts: DEFAULT_MAX_ATTEMPTS,
            lock_comment: DEFAULT_LOCK_COMMENT.to_owned(),
        }
    }
}

impl ToolConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            reason: format!("failed to read config file '{}': {e}", path.display()),
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::Config {
            reason: format!("invalid TOML: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `explicit` if given, else [`DEFAULT_CONFIG_FILE`] when it
    /// exists, else defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => Self::from_file(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any value is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::Config {
                reason: "port cannot be 0".to_owned(),
            });
        }
        if self.poll_max_attempts == 0 {
            return Err(Error::Config {
                reason: "poll_max_attempts must be at least 1".to_owned(),
            });
        }
        if self.lock_comment.trim().is_empty() {
            return Err(Error::Config {
                reason: "lock_comment cannot be empty".to_owned(),
            });
        }
        Ok(())
    }

    /// Job polling cadence.
    #[must_use]
    pub const fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.poll_interval_secs),
            max_attempts: self.poll_max_attempts,
        }
    }
}
