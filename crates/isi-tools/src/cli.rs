//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use isi_api::{Scheme, ToolConfig};

/// Operator tools for the cluster management API.
#[derive(Parser, Debug, Clone)]
#[command(name = "isi")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Management API port.
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// URI scheme used to reach the cluster.
    #[arg(long, value_enum, global = true)]
    pub scheme: Option<SchemeArg>,

    /// Configuration file (defaults to `isi-tools.toml` when present).
    #[arg(short, long, env = "ISI_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Credential record path.
    #[arg(long, global = true)]
    pub credentials: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table, global = true)]
    pub format: Format,

    /// Append an audit log of requests to this file.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Seconds between job status queries.
    #[arg(long, global = true)]
    pub poll_interval_secs: Option<u64>,

    /// Job status queries before giving up.
    #[arg(long, global = true)]
    pub poll_attempts: Option<u32>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Applies command-line overrides on top of file configuration.
    pub fn apply_overrides(&self, config: &mut ToolConfig) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(scheme) = self.scheme {
            config.scheme = scheme.into();
        }
        if let Some(path) = &self.credentials {
            config.credentials_file.clone_from(path);
        }
        if self.log_file.is_some() {
            config.log_file.clone_from(&self.log_file);
        }
        if let Some(secs) = self.poll_interval_secs {
            config.poll_interval_secs = secs;
        }
        if let Some(attempts) = self.poll_attempts {
            config.poll_max_attempts = attempts;
        }
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// URI scheme accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SchemeArg {
    /// TLS (certificates are not verified).
    Https,
    /// Plain HTTP.
    Http,
}

impl From<SchemeArg> for Scheme {
    fn from(arg: SchemeArg) -> Self {
        match arg {
            SchemeArg::Https => Self::Https,
            SchemeArg::Http => Self::Http,
        }
    }
}

/// Unit for quota usage figures (1024-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SizeUnit {
    /// Mebibytes.
    #[value(name = "M")]
    Mega,
    /// Gibibytes.
    #[value(name = "G")]
    Giga,
    /// Tebibytes.
    #[value(name = "T")]
    Tera,
}

impl SizeUnit {
    /// Bytes per unit.
    #[must_use]
    pub const fn divisor(self) -> u64 {
        match self {
            Self::Mega => 1 << 20,
            Self::Giga => 1 << 30,
            Self::Tera => 1 << 40,
        }
    }

    /// Column label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Mega => "MB",
            Self::Giga => "GB",
            Self::Tera => "TB",
        }
    }
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Interactive snapshot lock menu.
    Snaplock {
        /// Cluster node address.
        ip: String,
    },

    /// Lock several snapshots in one go.
    Lock {
        /// Cluster node address.
        ip: String,

        /// Snapshot ids (comma-separated).
        #[arg(value_delimiter = ',', required = true)]
        snapshots: Vec<u64>,

        /// Expiry as YYYY-MM-DD-HH-MM-SS (local time); never expires if absent.
        #[arg(short = 't', long = "expires")]
        expires: Option<String>,
    },

    /// Interactive changelist menu.
    Changelist {
        /// Cluster node address.
        ip: String,
    },

    /// Find an SMB open file across nodes and close it.
    ///
    /// The id and host of the file to close are asked for interactively,
    /// followed by a y/n confirmation.
    Locksmith {
        /// Substring of the file path to look for.
        filename: String,

        /// Hosts to search, e.g. `10.0.0.5,10.0.0.9-10.0.0.11`.
        #[arg(long)]
        hosts: Option<String>,
    },

    /// Quota usage report.
    QuotaReport {
        /// Cluster node address.
        ip: String,

        /// Unit for usage figures.
        #[arg(value_enum, ignore_case = true)]
        unit: SizeUnit,
    },

    /// Create a snapshot.
    Snapshot {
        /// Cluster node address.
        ip: String,

        /// Filesystem path to snapshot.
        path: String,

        /// Snapshot name.
        #[arg(short, long)]
        name: Option<String>,

        /// Expiry as YYYY-MM-DD-HH-MM-SS (local time).
        #[arg(short = 'x', long = "expires")]
        expires: Option<String>,
    },

    /// Store credentials after checking them against a node.
    Configure {
        /// Node to validate against; asked for when absent.
        #[arg(long)]
        node: Option<String>,
    },
}
