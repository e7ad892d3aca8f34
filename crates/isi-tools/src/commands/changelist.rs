//! Changelist menu.

use std::io::Write;

use isi_api::{JobSpec, ResourceClient, Session, SessionOpener};
use tracing::info;

use super::{Context, recover, validate_address};
use crate::error::CliError;
use crate::menu::{ChangelistChoice, Menu};
use crate::output::{ChangeListEntryTable, ChangeListTable, JobSummary, Message, SnapshotTable};
use crate::prompt::{Prompt, ask_number};

/// Changelist menu executor.
pub struct ChangelistCommand<'a> {
    ctx: &'a Context,
}

impl<'a> ChangelistCommand<'a> {
    /// Create a new changelist command.
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
        info!(host = ip, "changelist started");

        loop {
            let answer = prompt.ask(&ChangelistChoice::render(ip))?;
            let choice = match ChangelistChoice::parse(&answer) {
                Ok(choice) => choice,
                Err(unrecognized) => {
                    prompt.say(&unrecognized.to_string())?;
                    continue;
                }
            };
            if choice == ChangelistChoice::QUIT {
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
        choice: ChangelistChoice,
    ) -> Result<(), CliError> {
        let format = self.ctx.format();
        let client = ResourceClient::new(session);

        match choice {
            ChangelistChoice::ListSnapshots => {
                let snapshots = client.list_snapshots().await?;
                format.write(writer, &SnapshotTable { snapshots })?;
            }
            ChangelistChoice::CreateChangelist => {
                let older = ask_number(prompt, "ID of the older snapshot: ")?;
                let newer = ask_number(prompt, "ID of the newer snapshot: ")?;
                let spec = JobSpec::changelist(older, newer)?;

                let poller = self.ctx.poller();
                let job_id = poller.submit(session, &spec).await?;
                prompt.say(&format!("Job ID is {job_id}"))?;

                let interval = poller.policy().interval.as_secs();
                let outcome = poller
                    .await_completion_with(session, job_id, |attempt, state| {
                        prompt
                            .say(&format!(
                                "Job {job_id} is {state} (check {attempt}), querying again in {interval}s"
                            ))
                            .map_err(isi_api::Error::from)
                    })
                    .await?;
                format.write(writer, &JobSummary::from(&outcome))?;
            }
            ChangelistChoice::ListChangelists => {
                let changelists = client.list_changelists().await?;
                format.write(writer, &ChangeListTable { changelists })?;
            }
            ChangelistChoice::ShowChangelist => {
                let changelist_id = ask_changelist_id(prompt, "Changelist to display: ")?;
                let entries = client.changelist_entries(&changelist_id).await?;
                format.write(writer, &ChangeListEntryTable {
                    changelist_id,
                    entries,
                })?;
            }
            ChangelistChoice::DeleteChangelist => {
                let changelist_id = ask_changelist_id(prompt, "Changelist to delete: ")?;
                client.delete_changelist(&changelist_id).await?;
                format.write(
                    writer,
                    &Message::success(format!("Changelist {changelist_id} deleted")),
                )?;
            }
            ChangelistChoice::Quit => {}
        }
        Ok(())
    }
}

/// Changelist ids look like `<older>_<newer>`.
fn ask_changelist_id<P: Prompt>(prompt: &mut P, question: &str) -> Result<String, CliError> {
    loop {
        let answer = prompt.ask(question)?;
        let id = answer.trim();
        if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit() || c == '_') {
            return Ok(id.to_owned());
        }
        prompt.say(&format!("'{id}' is not a changelist id, e.g. 12_14"))?;
    }
}
