//! Snapshot creation.

use std::io::Write;

use chrono::Utc;
use isi_api::{LockExpiry, NewSnapshot, ResourceClient, SessionOpener};
use tracing::info;

use super::{Context, validate_address};
use crate::error::CliError;
use crate::output::Message;

/// Snapshot create executor.
pub struct SnapshotCommand<'a> {
    ctx: &'a Context,
}

impl<'a> SnapshotCommand<'a> {
    /// Create a new snapshot command.
    #[must_use]
    pub const fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    /// Snapshot `path` on `ip`, with an optional name and expiry.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid input, a refused session, or a rejected
    /// create request.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        ip: &str,
        path: &str,
        name: Option<&str>,
        expires: Option<&str>,
    ) -> Result<u64, CliError> {
        validate_address(ip)?;
        if path.trim().is_empty() {
            return Err(isi_api::Error::validation("snapshot path cannot be empty").into());
        }
        let expiry = LockExpiry::parse(expires.unwrap_or_default())?
            .validate(Utc::now().timestamp())?;

        let session = self.ctx.connector().open(ip).await?;
        let snapshot = NewSnapshot {
            path: path.to_owned(),
            name: name.map(str::to_owned),
            expires: expiry.epoch(),
        };
        let id = ResourceClient::new(&session)
            .create_snapshot(&snapshot)
            .await?;
        info!(id, path, "snapshot created");

        self.ctx.format().write(
            writer,
            &Message::success(format!("Snapshot {id} of {path} created")),
        )?;
        Ok(id)
    }
}
