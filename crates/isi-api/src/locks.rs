//! Snapshot lock lifecycle.
//!
//! A snapshot holds at most [`MAX_LOCKS_PER_SNAPSHOT`] locks. Creation checks
//! the current count first and refuses locally when the snapshot is full, so
//! no write is attempted that the cluster would reject anyway. Expiry times
//! must lie in the future; both checks happen before the create request.

use chrono::{Local, NaiveDateTime, TimeZone, Utc};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::resources::{NewLock, ResourceClient, SnapshotLock};
use crate::session::Session;

/// Cluster-enforced lock ceiling per snapshot.
pub const MAX_LOCKS_PER_SNAPSHOT: u64 = 16;

/// Accepted timestamp layout (24h, local time).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Comment recorded on locks created by these tools.
pub const DEFAULT_LOCK_COMMENT: &str = "This lock was created by isi-tools.";

/// Parses `YYYY-MM-DD-HH-MM-SS` in local time into epoch seconds.
pub fn parse_timestamp(input: &str) -> Result<i64> {
    let input = input.trim();
    let naive = NaiveDateTime::parse_from_str(input, TIMESTAMP_FORMAT).map_err(|e| {
        Error::validation(format!(
            "'{input}' is not a YYYY-MM-DD-HH-MM-SS timestamp: {e}"
        ))
    })?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp())
        .ok_or_else(|| Error::validation(format!("'{input}' does not exist in local time")))
}

/// When a lock expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockExpiry {
    /// The lock never expires.
    Never,
    /// The lock expires at this epoch second.
    At(i64),
}

impl LockExpiry {
    /// Parses operator input; blank means [`LockExpiry::Never`].
    pub fn parse(input: &str) -> Result<Self> {
        if input.trim().is_empty() {
            Ok(Self::Never)
        } else {
            parse_timestamp(input).map(Self::At)
        }
    }

    /// Rejects an expiry at or before `now`.
    pub fn validate(self, now: i64) -> Result<Self> {
        match self {
            Self::At(epoch) if epoch <= now => Err(Error::validation(
                "expiry must be later than the current time",
            )),
            other => Ok(other),
        }
    }

    /// Epoch seconds, if the lock expires.
    #[must_use]
    pub const fn epoch(self) -> Option<i64> {
        match self {
            Self::Never => None,
            Self::At(epoch) => Some(epoch),
        }
    }
}

/// Result of a successful lock creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedLock {
    /// New lock id.
    pub lock_id: u64,
    /// Locks that existed before this one.
    pub existing: u64,
    /// Free slots before this one was taken.
    pub available: u64,
}

/// Enforces the capacity and expiry rules around lock operations.
#[derive(Debug, Clone)]
pub struct LockManager {
    comment: String,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_COMMENT)
    }
}

impl LockManager {
    /// Creates a manager that stamps `comment` on new locks.
    pub fn new(comment: impl Into<String>) -> Self {
        Self {
            comment: comment.into(),
        }
    }

    /// Number of locks currently on a snapshot.
    pub async fn count(&self, session: &Session, snapshot_id: u64) -> Result<u64> {
        let list = ResourceClient::new(session).list_locks(snapshot_id).await?;
        Ok(list.total)
    }

    /// Locks currently on a snapshot.
    pub async fn list(&self, session: &Session, snapshot_id: u64) -> Result<Vec<SnapshotLock>> {
        let list = ResourceClient::new(session).list_locks(snapshot_id).await?;
        Ok(list.locks)
    }

    /// Creates a lock, checking expiry against the wall clock.
    pub async fn create(
        &self,
        session: &Session,
        snapshot_id: u64,
        expiry: LockExpiry,
    ) -> Result<CreatedLock> {
        self.create_at(session, snapshot_id, expiry, Utc::now().timestamp())
            .await
    }

    /// Creates a lock, checking expiry against `now`.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if the expiry is not after `now` (no request)
    /// - [`Error::Capacity`] if the snapshot is full (no create request)
    /// - [`Error::Create`] if the cluster rejects the lock
    pub async fn create_at(
        &self,
        session: &Session,
        snapshot_id: u64,
        expiry: LockExpiry,
        now: i64,
    ) -> Result<CreatedLock> {
        let expiry = expiry.validate(now)?;

        let existing = self.count(session, snapshot_id).await?;
        debug!(snapshot_id, existing, "lock count checked");
        if existing >= MAX_LOCKS_PER_SNAPSHOT {
            return Err(Error::Capacity {
                snapshot_id,
                current: existing,
                remaining: 0,
            });
        }

        let lock = NewLock {
            comment: self.comment.clone(),
            expires: expiry.epoch(),
        };
        let lock_id = ResourceClient::new(session)
            .create_lock(snapshot_id, &lock)
            .await?;
        info!(snapshot_id, lock_id, expires = ?expiry.epoch(), "snapshot lock created");

        Ok(CreatedLock {
            lock_id,
            existing,
            available: MAX_LOCKS_PER_SNAPSHOT - existing,
        })
    }

    /// Deletes one lock.
    pub async fn delete_one(&self, session: &Session, snapshot_id: u64, lock_id: u64) -> Result<()> {
        ResourceClient::new(session)
            .delete_lock(snapshot_id, lock_id)
            .await?;
        info!(snapshot_id, lock_id, "snapshot lock deleted");
        Ok(())
    }

    /// Deletes every lock on a snapshot.
    pub async fn delete_all(&self, session: &Session, snapshot_id: u64) -> Result<()> {
        ResourceClient::new(session)
            .delete_all_locks(snapshot_id)
            .await?;
        info!(snapshot_id, "all snapshot locks deleted");
        Ok(())
    }
}
