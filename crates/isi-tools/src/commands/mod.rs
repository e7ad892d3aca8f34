//! CLI command implementations.
//!
//! Each submodule implements one tool:
//! - [`snaplock`] - Snapshot lock menu
//! - [`lock`] - Batch snapshot locking
//! - [`changelist`] - Changelist menu
//! - [`locksmith`] - Multi-host SMB open-file close
//! - [`quota`] - Quota usage report
//! - [`snapshot`] - Snapshot creation
//! - [`configure`] - Credential record setup

pub mod changelist;
pub mod configure;
pub mod lock;
pub mod locksmith;
pub mod quota;
pub mod snapshot;
pub mod snaplock;

use std::io::Write;
use std::net::IpAddr;

use isi_api::{
    CachedCredentials, ChainedCredentials, Connector, CredentialFile, EnvCredentials, JobPoller,
    LockManager, ToolConfig,
};
use tracing::warn;

use crate::error::CliError;
use crate::output::{Message, OutputFormat};
use crate::prompt::PromptCredentials;

pub use changelist::ChangelistCommand;
pub use configure::ConfigureCommand;
pub use lock::LockCommand;
pub use locksmith::LocksmithCommand;
pub use quota::QuotaCommand;
pub use snapshot::SnapshotCommand;
pub use snaplock::SnaplockCommand;

/// Settings and output format shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    config: ToolConfig,
    format: OutputFormat,
}

impl Context {
    /// Creates a context.
    #[must_use]
    pub const fn new(config: ToolConfig, format: OutputFormat) -> Self {
        Self { config, format }
    }

    /// Effective configuration.
    #[must_use]
    pub const fn config(&self) -> &ToolConfig {
        &self.config
    }

    /// Output format.
    #[must_use]
    pub const fn format(&self) -> &OutputFormat {
        &self.format
    }

    /// Environment first, then the credential record, then the terminal.
    #[must_use]
    pub fn credential_chain(&self) -> ChainedCredentials {
        ChainedCredentials::new()
            .with(EnvCredentials::default())
            .with(CredentialFile::new(&self.config.credentials_file))
            .with(PromptCredentials)
    }

    /// Session opener; credentials are resolved once per invocation.
    #[must_use]
    pub fn connector(&self) -> Connector {
        Connector::new(
            self.config.scheme,
            self.config.port,
            CachedCredentials::new(self.credential_chain()),
        )
    }

    /// Job poller with the configured cadence.
    #[must_use]
    pub const fn poller(&self) -> JobPoller {
        JobPoller::new(self.config.poll_policy())
    }

    /// Lock manager stamping the configured comment.
    #[must_use]
    pub fn lock_manager(&self) -> LockManager {
        LockManager::new(self.config.lock_comment.clone())
    }
}

/// Rejects anything that is not an IPv4 or IPv6 address.
///
/// # Errors
///
/// Returns a validation error for host names and malformed addresses.
pub fn validate_address(ip: &str) -> Result<(), CliError> {
    ip.parse::<IpAddr>().map(drop).map_err(|_| {
        CliError::Api(isi_api::Error::validation(format!(
            "'{ip}' is not a valid IP address"
        )))
    })
}

/// Reports a menu operation's failure and keeps the menu running, unless
/// the failure is fatal.
///
/// # Errors
///
/// Returns `result`'s error when it is fatal, or a write failure.
pub fn recover<W: Write>(
    writer: &mut W,
    format: &OutputFormat,
    result: Result<(), CliError>,
) -> Result<(), CliError> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!(error = %e, "operation failed");
            format.write(writer, &Message::info(format!("Error: {e}")))
        }
    }
}
