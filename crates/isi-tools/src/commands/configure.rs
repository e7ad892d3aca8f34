//! Credential record setup.

use std::io::Write;

use isi_api::{CredentialFile, Credentials, Endpoint, Session};
use tracing::info;

use super::{Context, validate_address};
use crate::error::CliError;
use crate::output::Message;
use crate::prompt::Prompt;

/// Configure executor.
pub struct ConfigureCommand<'a> {
    ctx: &'a Context,
}

impl<'a> ConfigureCommand<'a> {
    /// Create a new configure command.
    #[must_use]
    pub const fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    /// Ask for credentials, prove them against a node, then save them.
    ///
    /// Nothing is written unless the node accepts the credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the node address is invalid, the session is
    /// refused, or the record cannot be written.
    pub async fn execute<W: Write, P: Prompt>(
        &self,
        writer: &mut W,
        prompt: &mut P,
        node: Option<&str>,
    ) -> Result<(), CliError> {
        let username = prompt.ask("User name: ")?;
        let username = username.trim();
        if username.is_empty() {
            return Err(isi_api::Error::validation("user name cannot be empty").into());
        }
        let password = prompt.ask_secret("Password: ")?;
        let node = match node {
            Some(node) => node.to_owned(),
            None => prompt.ask("Address of a node to check the credentials against: ")?,
        };
        let node = node.trim();
        validate_address(node)?;

        let config = self.ctx.config();
        let credentials = Credentials::new(username, password);
        let endpoint = Endpoint::new(config.scheme, node, config.port);
        Session::open(endpoint, &credentials).await?;

        let file = CredentialFile::new(&config.credentials_file);
        file.save(&credentials)?;
        info!(user = username, path = %file.path().display(), "credentials saved");

        self.ctx.format().write(
            writer,
            &Message::success(format!(
                "Credentials for {username} saved to {}",
                file.path().display()
            )),
        )
    }
}
