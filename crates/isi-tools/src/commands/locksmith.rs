//! Multi-host SMB open-file close.
//!
//! Searches every host for open files matching a name, shows the merged
//! table, then closes the one the operator picks after confirmation.

use std::io::Write;

use isi_api::{Error, SearchReport, Selection, expand_hosts, fanout};
use tracing::info;

use super::Context;
use crate::error::CliError;
use crate::output::{Message, OpenFileTable};
use crate::prompt::{Prompt, ask_number};

/// Locksmith executor.
pub struct LocksmithCommand<'a> {
    ctx: &'a Context,
}

impl<'a> LocksmithCommand<'a> {
    /// Create a new locksmith command.
    #[must_use]
    pub const fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    /// Search `hosts` (asked for when `None`) for `filename` and close the
    /// chosen match.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid host ranges or answers, a refused session,
    /// an id that matches nothing, or a rejected close request.
    pub async fn execute<W: Write, P: Prompt>(
        &self,
        writer: &mut W,
        prompt: &mut P,
        filename: &str,
        hosts: Option<&str>,
    ) -> Result<(), CliError> {
        let format = self.ctx.format();
        let spec = match hosts {
            Some(spec) => spec.to_owned(),
            None => prompt.ask(
                "Addresses to check for open files, e.g. 10.0.0.5,10.0.0.9-10.0.0.11: ",
            )?,
        };
        let hosts = expand_hosts(&spec)?;
        info!(hosts = hosts.len(), filename, "locksmith search started");

        let connector = self.ctx.connector();
        let report = fanout::search(&connector, &hosts, filename).await?;
        if report.index.is_empty() {
            for failure in &report.skipped {
                prompt.say(&format!("skipped {}: {}", failure.host, failure.reason))?;
            }
            format.write(
                writer,
                &Message::info(format!("Cannot find an instance of {filename} open")),
            )?;
            return Ok(());
        }
        format.write(writer, &OpenFileTable::from(&report))?;

        let selection = choose(prompt, &report)?;
        let target = report.index.resolve(&selection)?;
        let answer = prompt.ask(&format!(
            "Close {} (ID {} on {})? Enter 'y' or 'n': ",
            target.file.file, target.file.id, target.host
        ))?;

        match fanout::resolve_and_act(&connector, &report.index, &selection, &answer).await {
            Ok(closed) => format.write(
                writer,
                &Message::success(format!(
                    "The file associated with ID {} on {} has been closed",
                    closed.file.id, closed.host
                )),
            ),
            Err(Error::Aborted) => format.write(
                writer,
                &Message::info("Nothing was closed; run the tool again to pick another file"),
            ),
            Err(e) => Err(e.into()),
        }
    }
}

/// Asks for the id, and for a host too when the id exists on several.
fn choose<P: Prompt>(prompt: &mut P, report: &SearchReport) -> Result<Selection, CliError> {
    let id = ask_number(prompt, "ID of the file to close: ")?;
    let hosts = report.index.hosts_for(id);
    if hosts.len() < 2 {
        return Ok(Selection::id(id));
    }
    let host = prompt.ask(&format!(
        "ID {id} is open on {}; which host? ",
        hosts.join(", ")
    ))?;
    Ok(Selection::on_host(id, host.trim()))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::commands::tests::{mock_context, mock_login};
    use crate::prompt::LinePrompt;

    const OPENFILES: &str = "/platform/1/protocols/smb/openfiles";

    async fn run(
        ctx: &Context,
        hosts: Option<&str>,
        input: &str,
    ) -> (Result<(), CliError>, String, String) {
        let mut out = Vec::new();
        let mut prompt = LinePrompt::new(Cursor::new(input.as_bytes().to_vec()), Vec::new());
        let result = LocksmithCommand::new(ctx)
            .execute(&mut out, &mut prompt, "report.csv", hosts)
            .await;
        let shown = String::from_utf8(prompt.into_output()).expect("utf8");
        (result, String::from_utf8(out).expect("utf8"), shown)
    }

    async fn mock_open_files(server: &MockServer) {
        server
            .mock_async(|when, then| {
                when.method(GET).path(OPENFILES);
                then.status(200).json_body(json!({"openfiles": [
                    {"id": 7, "file": "C:\\ifs\\share\\report.csv", "user": "alice", "locks": 1},
                    {"id": 8, "file": "C:\\ifs\\share\\notes.txt", "user": "bob", "locks": 0}
                ]}));
            })
            .await;
    }

    #[tokio::test]
    async fn closes_confirmed_file() {
        let server = MockServer::start_async().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = mock_context(&server, &dir);
        mock_login(&server).await;
        mock_open_files(&server).await;
        let close = server
            .mock_async(|when, then| {
                when.method(DELETE)
                    .path(format!("{OPENFILES}/7"))
                    .header("X-CSRF-Token", "tok-1");
                then.status(204);
            })
            .await;

        let (result, out, shown) = run(&ctx, None, "127.0.0.1\n7\ny\n").await;

        result.expect("file closed");
        assert!(shown.contains("Addresses to check"));
        assert!(shown.contains("report.csv (ID 7 on 127.0.0.1)"));
        assert!(out.contains("report.csv"));
        assert!(!out.contains("notes.txt"));
        assert!(out.contains("ID 7 on 127.0.0.1 has been closed"));
        close.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn declined_confirmation_closes_nothing() {
        let server = MockServer::start_async().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = mock_context(&server, &dir);
        mock_login(&server).await;
        mock_open_files(&server).await;
        let close = server
            .mock_async(|when, then| {
                when.method(DELETE).path(format!("{OPENFILES}/7"));
                then.status(204);
            })
            .await;

        let (result, out, _) = run(&ctx, Some("127.0.0.1"), "7\nn\n").await;

        result.expect("declining is not an error");
        assert!(out.contains("Nothing was closed"));
        close.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn unclear_confirmation_is_rejected() {
        let server = MockServer::start_async().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = mock_context(&server, &dir);
        mock_login(&server).await;
        mock_open_files(&server).await;
        let close = server
            .mock_async(|when, then| {
                when.method(DELETE).path(format!("{OPENFILES}/7"));
                then.status(204);
            })
            .await;

        let (result, _, _) = run(&ctx, Some("127.0.0.1"), "7\nYes\n").await;

        let err = result.expect_err("strict answer");
        assert_eq!(err.exit_code(), crate::error::EXIT_VALIDATION);
        close.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let server = MockServer::start_async().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = mock_context(&server, &dir);
        mock_login(&server).await;
        mock_open_files(&server).await;

        let (result, _, shown) = run(&ctx, Some("127.0.0.1"), "8\n").await;

        assert!(matches!(
            result,
            Err(CliError::Api(Error::NotFound { id: 8, .. }))
        ));
        assert!(!shown.contains("Enter 'y'"));
    }

    #[tokio::test]
    async fn no_match_reports_and_succeeds() {
        let server = MockServer::start_async().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = mock_context(&server, &dir);
        mock_login(&server).await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(OPENFILES);
                then.status(200).json_body(json!({"openfiles": []}));
            })
            .await;

        let (result, out, _) = run(&ctx, Some("127.0.0.1"), "").await;

        result.expect("nothing to do");
        assert!(out.contains("Cannot find an instance of report.csv open"));
    }

    #[tokio::test]
    async fn bad_host_range_is_fatal() {
        let server = MockServer::start_async().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = mock_context(&server, &dir);
        let login = mock_login(&server).await;

        let (result, _, _) = run(&ctx, Some("10.0.0.9-10.0.0.3"), "").await;

        assert_eq!(
            result.expect_err("range ends before start").exit_code(),
            crate::error::EXIT_VALIDATION
        );
        login.assert_hits_async(0).await;
    }
}
