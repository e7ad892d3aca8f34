//! Snapshot lock menu.
//!
//! Opens one session, then loops over the [`SnaplockChoice`] menu until the
//! operator quits. Failed operations are reported and the menu comes back;
//! authentication and input validation failures end the run.

use std::io::Write;

use chrono::Utc;
use isi_api::{LockExpiry, MAX_LOCKS_PER_SNAPSHOT, ResourceClient, Session, SessionOpener};
use tracing::info;

use super::{Context, recover, validate_address};
use crate::error::CliError;
use crate::menu::{Menu, SnaplockChoice};
use crate::output::{LockTable, Message, SnapshotTable};
use crate::prompt::{Prompt, ask_number};

/// Snaplock menu executor.
pub struct SnaplockCommand<'a> {
    ctx: &'a Context,
}

impl<'a> SnaplockCommand<'a> {
    /// Create a new snaplock command.
    #[must_use]
    pub const fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    /// Run the menu against `ip`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid, the session cannot be
    /// established, or an operation fails fatally.
    pub async fn execute<W: Write, P: Prompt>(
        &self,
        writer: &mut W,
        prompt: &mut P,
        ip: &str,
    ) -> Result<(), CliError> {
        validate_address(ip)?;
        let session = self.ctx.connector().open(ip).await?;
        info!(host = ip, "snaplock started");

        loop {
            let answer = prompt.ask(&SnaplockChoice::render(ip))?;
            let choice = match SnaplockChoice::parse(&answer) {
                Ok(choice) => choice,
                Err(unrecognized) => {
                    prompt.say(&unrecognized.to_string())?;
                    continue;
                }
            };
            if choice == SnaplockChoice::QUIT {
                return Ok(());
            }
            let result = self.dispatch(writer, prompt, &session, choice).await;
            recover(writer, self.ctx.format(), result)?;
        }
    }

    async fn dispatch<W: Write, P: Prompt>(
        &self,
        writer: &mut W,
        prompt: &mut P,
        session: &Session,
        choice: SnaplockChoice,
    ) -> Result<(), CliError> {
        let format = self.ctx.format();
        let locks = self.ctx.lock_manager();

        match choice {
            SnaplockChoice::ListSnapshots => {
                let snapshots = ResourceClient::new(session).list_snapshots().await?;
                format.write(writer, &SnapshotTable { snapshots })?;
            }
            SnaplockChoice::LockSnapshot => {
                prompt.say(&format!(
                    "A snapshot can hold at most {MAX_LOCKS_PER_SNAPSHOT} locks."
                ))?;
                let snapshot_id = ask_number(prompt, "ID of the snapshot to lock: ")?;
                let expiry = ask_expiry(prompt)?;
                let created = locks.create(session, snapshot_id, expiry).await?;
                format.write(
                    writer,
                    &Message::success(format!(
                        "Lock ID {} created on snapshot {snapshot_id}; {} more may be created",
                        created.lock_id,
                        created.available.saturating_sub(1)
                    )),
                )?;
            }
            SnaplockChoice::ListLocks => {
                let snapshot_id = ask_number(prompt, "ID of the snapshot whose locks to list: ")?;
                let list = locks.list(session, snapshot_id).await?;
                format.write(writer, &LockTable {
                    snapshot_id,
                    locks: list,
                })?;
            }
            SnaplockChoice::DeleteLock => {
                let snapshot_id = ask_number(prompt, "ID of the snapshot holding the lock: ")?;
                let lock_id = ask_number(prompt, &format!("ID of the lock on snapshot {snapshot_id}: "))?;
                locks.delete_one(session, snapshot_id, lock_id).await?;
                format.write(writer, &Message::success(format!("Lock ID {lock_id} deleted")))?;
            }
            SnaplockChoice::DeleteAllLocks => {
                let snapshot_id =
                    ask_number(prompt, "ID of the snapshot to remove ALL locks from: ")?;
                locks.delete_all(session, snapshot_id).await?;
                format.write(
                    writer,
                    &Message::success(format!("All locks deleted for snapshot {snapshot_id}")),
                )?;
            }
            SnaplockChoice::Quit => {}
        }
        Ok(())
    }
}

/// Asks for an expiry until it is blank or in the future.
fn ask_expiry<P: Prompt>(prompt: &mut P) -> Result<LockExpiry, CliError> {
    loop {
        let answer = prompt.ask(
            "Expiry as YYYY-MM-DD-HH-MM-SS (24h), or blank to never expire: ",
        )?;
        match LockExpiry::parse(&answer).and_then(|e| e.validate(Utc::now().timestamp())) {
            Ok(expiry) => return Ok(expiry),
            Err(e) => prompt.say(&e.to_string())?,
        }
    }
}
