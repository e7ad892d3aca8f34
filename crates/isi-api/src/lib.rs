//! # isi-api
//!
//! Client for the cluster management API used by the `isi` operator tools.
//!
//! Provides:
//! - Authenticated sessions with the CSRF/referer header contract
//! - Typed snapshot, lock, job, changelist, open-file and quota operations
//! - Job submission and bounded polling
//! - Snapshot lock capacity and expiry rules
//! - Multi-host open-file search with `(id, host)` resolution
//!
//! # Architecture
//!
//! ```text
//! CredentialProvider ─► Session ─► ResourceClient ─┬─► JobPoller
//!                                                  ├─► LockManager
//!                         (× hosts) ───────────────┴─► fanout::search ─► resolve_and_act
//! ```
//!
//! Everything runs sequentially: one request is awaited before the next one
//! is sent, and hosts are visited in order.
//!
//! # Example
//!
//! ```rust,no_run
//! use isi_api::{Connector, Credentials, LockExpiry, LockManager, Scheme, SessionOpener};
//!
//! # async fn example() -> isi_api::Result<()> {
//! let connector = Connector::new(Scheme::Https, 8080, Credentials::new("admin", "secret"));
//! let session = connector.open("10.0.0.5").await?;
//! let created = LockManager::default()
//!     .create(&session, 42, LockExpiry::Never)
//!     .await?;
//! println!("lock {} created", created.lock_id);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod credentials;
pub mod error;
pub mod fanout;
pub mod jobs;
pub mod locks;
pub mod resources;
pub mod session;

pub use config::ToolConfig;
pub use credentials::{
    CachedCredentials, ChainedCredentials, CredentialFile, CredentialProvider, Credentials,
    EnvCredentials,
};
pub use error::{Error, Result};
pub use fanout::{
    Confirmation, HostFailure, HostedOpenFile, OpenFileIndex, SearchReport, Selection,
    expand_hosts,
};
pub use jobs::{JobOutcome, JobPoller, JobSpec, JobState, PollPolicy};
pub use locks::{CreatedLock, LockExpiry, LockManager, MAX_LOCKS_PER_SNAPSHOT};
pub use resources::{
    ChangeList, ChangeListEntry, LockList, NewSnapshot, OpenFile, Quota, QuotaUsage,
    ResourceClient, Snapshot, SnapshotLock,
};
pub use session::{Connector, Endpoint, Scheme, Session, SessionOpener, SuccessCodes};
