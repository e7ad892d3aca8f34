//! Credential sources for session establishment.
//!
//! A session only needs a username and password. Where they come from is
//! pluggable through [`CredentialProvider`]:
//!
//! - [`EnvCredentials`]: `ISI_USERNAME` / `ISI_PASSWORD`
//! - [`CredentialFile`]: the `creds.json` record written by `isi configure`
//! - [`Credentials`]: a fixed pair (configure flow, tests)
//! - [`ChainedCredentials`]: first provider that has an answer wins
//! - [`CachedCredentials`]: resolves once, then replays for every host
//!
//! The interactive prompt provider lives in the CLI crate.

use std::fmt;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Default environment variable holding the username.
pub const USERNAME_ENV: &str = "ISI_USERNAME";

/// Default environment variable holding the password.
pub const PASSWORD_ENV: &str = "ISI_PASSWORD";

/// A username/password pair.
pub struct Credentials {
    username: String,
    password: SecretString,
}

impl Credentials {
    /// Creates a credential pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// The account name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The password, exposed for the authentication request body.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }
}

impl Clone for Credentials {
    fn clone(&self) -> Self {
        Self::new(self.username.clone(), self.password().to_owned())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Supplies credentials for an endpoint.
///
/// `Ok(None)` means the provider has nothing to offer and the next source
/// should be consulted.
pub trait CredentialProvider: Send + Sync {
    /// Returns credentials to use against `endpoint`.
    fn credentials(&self, endpoint: &str) -> Result<Option<Credentials>>;
}

impl CredentialProvider for Credentials {
    fn credentials(&self, _endpoint: &str) -> Result<Option<Credentials>> {
        Ok(Some(self.clone()))
    }
}

impl<P: CredentialProvider + ?Sized> CredentialProvider for Box<P> {
    fn credentials(&self, endpoint: &str) -> Result<Option<Credentials>> {
        (**self).credentials(endpoint)
    }
}

/// Reads credentials from environment variables.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    username_var: String,
    password_var: String,
}

impl EnvCredentials {
    /// Uses custom variable names.
    pub fn new(username_var: impl Into<String>, password_var: impl Into<String>) -> Self {
        Self {
            username_var: username_var.into(),
            password_var: password_var.into(),
        }
    }
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self::new(USERNAME_ENV, PASSWORD_ENV)
    }
}

impl CredentialProvider for EnvCredentials {
    fn credentials(&self, _endpoint: &str) -> Result<Option<Credentials>> {
        match (
            std::env::var(&self.username_var),
            std::env::var(&self.password_var),
        ) {
            (Ok(user), Ok(pass)) if !user.is_empty() => Ok(Some(Credentials::new(user, pass))),
            _ => Ok(None),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct CredentialRecord {
    username: String,
    password: String,
}

/// The on-disk credential record (`{"username": .., "password": <base64>}`).
#[derive(Debug, Clone)]
pub struct CredentialFile {
    path: PathBuf,
}

impl CredentialFile {
    /// Points at a credential file; it does not need to exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the record, returning `None` when the file does not exist.
    pub fn load(&self) -> Result<Option<Credentials>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: CredentialRecord =
            serde_json::from_str(&content).map_err(|e| Error::Config {
                reason: format!("malformed credential file '{}': {e}", self.path.display()),
            })?;
        let password = STANDARD
            .decode(record.password.as_bytes())
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .ok_or_else(|| Error::Config {
                reason: format!(
                    "credential file '{}' has an undecodable password",
                    self.path.display()
                ),
            })?;

        debug!(path = %self.path.display(), user = %record.username, "loaded credential file");
        Ok(Some(Credentials::new(record.username, password)))
    }

    /// Writes the record, replacing any existing file.
    pub fn save(&self, credentials: &Credentials) -> Result<()> {
        let record = CredentialRecord {
            username: credentials.username().to_owned(),
            password: STANDARD.encode(credentials.password().as_bytes()),
        };
        let json = serde_json::to_string_pretty(&record).map_err(|e| Error::Config {
            reason: format!("cannot encode credential record: {e}"),
        })?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl CredentialProvider for CredentialFile {
    fn credentials(&self, _endpoint: &str) -> Result<Option<Credentials>> {
        self.load()
    }
}

/// Tries each provider in order.
#[derive(Default)]
pub struct ChainedCredentials {
    providers: Vec<Box<dyn CredentialProvider>>,
}

impl ChainedCredentials {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a provider to the end of the chain.
    #[must_use]
    pub fn with(mut self, provider: impl CredentialProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }
}

impl CredentialProvider for ChainedCredentials {
    fn credentials(&self, endpoint: &str) -> Result<Option<Credentials>> {
        for provider in &self.providers {
            if let Some(creds) = provider.credentials(endpoint)? {
                return Ok(Some(creds));
            }
        }
        Ok(None)
    }
}

/// Resolves credentials once and replays them for every later endpoint.
pub struct CachedCredentials<P> {
    inner: P,
    cached: Mutex<Option<Credentials>>,
}

impl<P: CredentialProvider> CachedCredentials<P> {
    /// Wraps a provider.
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cached: Mutex::new(None),
        }
    }
}

impl<P: CredentialProvider> CredentialProvider for CachedCredentials<P> {
    fn credentials(&self, endpoint: &str) -> Result<Option<Credentials>> {
        let mut cached = self.cached.lock();
        if let Some(creds) = cached.as_ref() {
            return Ok(Some(creds.clone()));
        }
        let resolved = self.inner.credentials(endpoint)?;
        if let Some(creds) = &resolved {
            *cached = Some(creds.clone());
        }
        Ok(resolved)
    }
}
