//! CLI error types.

use thiserror::Error;

/// Exit code for a failed operation the workflow could recover from.
pub const EXIT_FAILURE: u8 = 1;

/// Exit code for rejected operator input.
pub const EXIT_VALIDATION: u8 = 2;

/// Exit code for authentication or transport failure.
pub const EXIT_AUTH: u8 = 4;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Cluster API failure.
    #[error(transparent)]
    Api(#[from] isi_api::Error),

    /// Output formatting error.
    #[error("format error: {0}")]
    Format(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Whether the error ends an interactive session instead of returning to
    /// the menu.
    ///
    /// A closed or broken terminal is fatal too, otherwise a menu would spin
    /// on end of input.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Api(e) => e.is_fatal(),
            Self::Io(_) => true,
            Self::Format(_) => false,
        }
    }

    /// Process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Api(isi_api::Error::Auth { .. } | isi_api::Error::Http(_)) => EXIT_AUTH,
            Self::Api(isi_api::Error::Validation { .. }) => EXIT_VALIDATION,
            _ => EXIT_FAILURE,
        }
    }
}
