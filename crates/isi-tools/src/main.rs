//! `isi` binary entrypoint.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use isi_api::ToolConfig;
use tracing_subscriber::EnvFilter;

use isi_tools::cli::{Cli, Commands};
use isi_tools::commands::{
    ChangelistCommand, ConfigureCommand, Context, LockCommand, LocksmithCommand, QuotaCommand,
    SnaplockCommand, SnapshotCommand,
};
use isi_tools::error::{CliError, EXIT_FAILURE};
use isi_tools::output::OutputFormat;
use isi_tools::prompt::TerminalPrompt;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(e.exit_code());
        }
    };

    if let Err(e) = init_tracing(config.log_file.as_deref()) {
        eprintln!("Failed to open log file: {e}");
        return ExitCode::from(EXIT_FAILURE);
    }

    // One workflow at a time; nothing is spawned.
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    match runtime.block_on(run(cli, config)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

/// File settings, then command-line overrides.
fn load_config(cli: &Cli) -> Result<ToolConfig, CliError> {
    let mut config = ToolConfig::discover(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// Stderr at `warn` by default, or an append-only audit file at `info`.
fn init_tracing(log_file: Option<&Path>) -> io::Result<()> {
    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
                )
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
                )
                .with_writer(io::stderr)
                .init();
        }
    }
    Ok(())
}

async fn run(cli: Cli, config: ToolConfig) -> Result<ExitCode, CliError> {
    let ctx = Context::new(config, OutputFormat::new(cli.format));
    let mut stdout = io::stdout();
    let mut prompt = TerminalPrompt;

    match cli.command {
        Commands::Snaplock { ip } => {
            let cmd = SnaplockCommand::new(&ctx);
            cmd.execute(&mut stdout, &mut prompt, &ip).await?;
        }
        Commands::Lock {
            ip,
            snapshots,
            expires,
        } => {
            let cmd = LockCommand::new(&ctx);
            let report = cmd
                .execute(&mut stdout, &ip, &snapshots, expires.as_deref())
                .await?;
            if report.failures() > 0 {
                return Ok(ExitCode::from(EXIT_FAILURE));
            }
        }
        Commands::Changelist { ip } => {
            let cmd = ChangelistCommand::new(&ctx);
            cmd.execute(&mut stdout, &mut prompt, &ip).await?;
        }
        Commands::Locksmith { filename, hosts } => {
            let cmd = LocksmithCommand::new(&ctx);
            cmd.execute(&mut stdout, &mut prompt, &filename, hosts.as_deref())
                .await?;
        }
        Commands::QuotaReport { ip, unit } => {
            let cmd = QuotaCommand::new(&ctx);
            cmd.execute(&mut stdout, &ip, unit).await?;
        }
        Commands::Snapshot {
            ip,
            path,
            name,
            expires,
        } => {
            let cmd = SnapshotCommand::new(&ctx);
            cmd.execute(&mut stdout, &ip, &path, name.as_deref(), expires.as_deref())
                .await?;
        }
        Commands::Configure { node } => {
            let cmd = ConfigureCommand::new(&ctx);
            cmd.execute(&mut stdout, &mut prompt, node.as_deref())
                .await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
