//! VaultSync CLI - Command-line interface for VaultSync
//!
//! Provides commands for:
//! - Pulling remote changes, pushing local ones, resetting local edits
//! - Watching the local tree and recording changes
//! - Viewing sync status
//! - Managing the stored credential and the configuration

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod app;
mod commands;
mod confirm;
mod notifier;
mod output;

use app::AppContext;
use commands::{
    auth::AuthCommand,
    config::ConfigCommand,
    status::StatusCommand,
    sync::{PullCommand, PushCommand, ResetCommand},
    watch::WatchCommand,
};
use output::{get_formatter, OutputFormat};
use vaultsync_sync::SyncError;

#[derive(Debug, Parser)]
#[command(
    name = "vaultsync",
    version,
    about = "Keep a local note vault and its remote copy in sync"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Download remote changes into the local tree
    Pull(PullCommand),
    /// Upload pending local changes
    Push(PushCommand),
    /// Discard pending local changes
    Reset(ResetCommand),
    /// Show synchronization status
    Status(StatusCommand),
    /// Record local changes until interrupted
    Watch(WatchCommand),
    /// Credential commands
    #[command(subcommand)]
    Auth(AuthCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Picks the log filter: `RUST_LOG`, then the flags, then the config file
fn log_filter(verbose: u8, quiet: bool, configured: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => configured,
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
}

fn init_tracing(cli: &Cli, configured_level: &str) {
    let filter = log_filter(cli.verbose, cli.quiet, configured_level);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    let app = match AppContext::load(format, cli.quiet, cli.config.as_deref()) {
        Ok(app) => app,
        Err(e) => {
            get_formatter(cli.json).error(&format!("{e:#}"));
            std::process::exit(2);
        }
    };
    init_tracing(&cli, &app.config.logging.level);

    let result = match &cli.command {
        Commands::Pull(cmd) => cmd.execute(&app).await,
        Commands::Push(cmd) => cmd.execute(&app).await,
        Commands::Reset(cmd) => cmd.execute(&app).await,
        Commands::Status(cmd) => cmd.execute(&app).await,
        Commands::Watch(cmd) => cmd.execute(&app).await,
        Commands::Auth(cmd) => cmd.execute(&app).await,
        Commands::Config(cmd) => cmd.execute(&app).await,
    };

    if let Err(e) = result {
        // Sync failures other than a busy engine were announced by the notifier.
        let announced = e
            .downcast_ref::<SyncError>()
            .is_some_and(|err| !matches!(err, SyncError::AlreadySyncing));
        if !announced {
            app.formatter().error(&format!("{e:#}"));
        }
        std::process::exit(1);
    }
    Ok(())
}
