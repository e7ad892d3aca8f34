//! # isi-tools
//!
//! Operator tools for the cluster management API.
//!
//! Provides commands for:
//! - Snapshot locking, interactively or in batches
//! - Changelist jobs between two snapshots
//! - Closing SMB open files found across several nodes
//! - Quota usage reports and snapshot creation
//!
//! # Architecture
//!
//! Every command talks to the cluster through `isi-api`. Interactive tools
//! read operator input through [`prompt::Prompt`] and show results through
//! [`output::OutputFormat`], so both ends can be scripted.
//!
//! ```text
//! ┌───────────┐   Prompt    ┌──────────┐  HTTPS/JSON  ┌──────────────┐
//! │ operator  │────────────►│ isi-tools│─────────────►│ cluster node │
//! └───────────┘◄────────────└──────────┘   (isi-api)  └──────────────┘
//!                OutputFormat
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod menu;
pub mod output;
pub mod prompt;

pub use cli::{Cli, Commands, Format, SizeUnit};
pub use commands::Context;
pub use error::CliError;
pub use output::OutputFormat;
