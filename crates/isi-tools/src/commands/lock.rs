//! Batch snapshot locking.

use std::io::Write;

use chrono::Utc;
use isi_api::{LockExpiry, SessionOpener};
use tracing::warn;

use super::{Context, validate_address};
use crate::error::CliError;
use crate::output::{BatchLockEntry, BatchLockReport};

/// Batch lock executor.
pub struct LockCommand<'a> {
    ctx: &'a Context,
}

impl<'a> LockCommand<'a> {
    /// Create a new lock command.
    #[must_use]
    pub const fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    /// Lock every snapshot in `snapshot_ids`, in order.
    ///
    /// The expiry is checked once, against the time the batch starts, before
    /// anything is sent. A snapshot that cannot be locked is reported and the
    /// batch moves on.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid input, a refused session, or when at least
    /// one snapshot could not be locked.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        ip: &str,
        snapshot_ids: &[u64],
        expires: Option<&str>,
    ) -> Result<BatchLockReport, CliError> {
        validate_address(ip)?;
        let started = Utc::now().timestamp();
        let expiry = LockExpiry::parse(expires.unwrap_or_default())?.validate(started)?;

        let session = self.ctx.connector().open(ip).await?;
        let locks = self.ctx.lock_manager();

        let mut report = BatchLockReport::default();
        for &snapshot_id in snapshot_ids {
            let entry = match locks.create_at(&session, snapshot_id, expiry, started).await {
                Ok(created) => BatchLockEntry {
                    snapshot_id,
                    lock_id: Some(created.lock_id),
                    remaining: Some(created.available.saturating_sub(1)),
                    error: None,
                },
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!(snapshot_id, error = %e, "snapshot not locked");
                    BatchLockEntry {
                        snapshot_id,
                        lock_id: None,
                        remaining: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            report.results.push(entry);
        }

        self.ctx.format().write(writer, &report)?;
        Ok(report)
    }
}
