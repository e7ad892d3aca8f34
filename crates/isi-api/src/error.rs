//! Error types for cluster management API operations.

use thiserror::Error;

/// Errors that can occur while talking to the cluster management API.
#[derive(Debug, Error)]
pub enum Error {
    /// Session establishment failed.
    #[error("session to {endpoint} not established: {reason}")]
    Auth {
        /// Endpoint URI the session was requested from.
        endpoint: String,
        /// Why the session was refused.
        reason: String,
    },

    /// Operator input failed validation.
    #[error("invalid input: {reason}")]
    Validation {
        /// The reason the input was rejected.
        reason: String,
    },

    /// The snapshot already holds the maximum number of locks.
    #[error("snapshot {snapshot_id} has {current} locks, {remaining} more allowed")]
    Capacity {
        /// Snapshot that is full.
        snapshot_id: u64,
        /// Locks currently held.
        current: u64,
        /// Slots left (always zero when this error is raised).
        remaining: u64,
    },

    /// Job submission was rejected.
    #[error("job submission to {url} failed with status {status}")]
    Submit {
        /// Request URL.
        url: String,
        /// HTTP status returned.
        status: u16,
    },

    /// Job status polling was rejected.
    #[error("job status query at {url} failed with status {status}")]
    Poll {
        /// Request URL.
        url: String,
        /// HTTP status returned.
        status: u16,
    },

    /// A create request was rejected.
    #[error("create request to {url} failed with status {status}")]
    Create {
        /// Request URL.
        url: String,
        /// HTTP status returned.
        status: u16,
    },

    /// A delete request was rejected.
    #[error("delete request to {url} failed with status {status}")]
    Delete {
        /// Request URL.
        url: String,
        /// HTTP status returned.
        status: u16,
    },

    /// A read request was rejected.
    #[error("query at {url} failed with status {status}")]
    Query {
        /// Request URL.
        url: String,
        /// HTTP status returned.
        status: u16,
    },

    /// The chosen record is not present in the aggregated results.
    #[error("no open file with id {id}{}", host.as_deref().map(|h| format!(" on {h}")).unwrap_or_default())]
    NotFound {
        /// Chosen record id.
        id: u64,
        /// Host the caller pinned, if any.
        host: Option<String>,
    },

    /// The chosen id exists on more than one host.
    #[error("open file id {id} exists on several hosts ({}); choose one", hosts.join(", "))]
    Ambiguous {
        /// Chosen record id.
        id: u64,
        /// Hosts that report this id.
        hosts: Vec<String>,
    },

    /// The operator declined a destructive action.
    #[error("operation aborted by user")]
    Aborted,

    /// A response body could not be decoded.
    #[error("unexpected response from {url}: {reason}")]
    Decode {
        /// Request URL.
        url: String,
        /// Decoder message.
        reason: String,
    },

    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {reason}")]
    Config {
        /// The reason configuration failed.
        reason: String,
    },

    /// Transport-level HTTP failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Local I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a validation failure.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Whether this error must terminate the whole workflow.
    ///
    /// Authentication and input validation failures end the process; every
    /// other category is reported and control returns to the caller.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth { .. } | Self::Validation { .. })
    }
}

/// Result type alias for API operations.
pub type Result<T> = std::result::Result<T, Error>;
