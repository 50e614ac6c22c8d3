//! Sync commands - Pull, push and reset
//!
//! Provides the `vaultsync pull`, `vaultsync push` and `vaultsync reset`
//! commands which:
//! 1. Load configuration and the state document
//! 2. Create the adapters (files API, JSON state store, local tree)
//! 3. Run one engine and display the summary
//!
//! Failures are announced by the engine through the notifier before the
//! error is returned.

use anyhow::{bail, Result};
use clap::Args;
use tracing::info;

use vaultsync_core::ports::{AcceptAll, IPushConfirmer};

use crate::app::AppContext;
use crate::confirm::PromptConfirmer;
use crate::output::print_report;

/// Download remote changes into the local tree
#[derive(Debug, Args)]
pub struct PullCommand {}

impl PullCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        let engine = app.build_engine().await?;
        info!("Starting pull");

        let report = engine.pull().await?;
        print_report(&*app.formatter(), app.format, "pull", &report);
        Ok(())
    }
}

/// Upload pending local changes
#[derive(Debug, Args)]
pub struct PushCommand {
    /// Push every pending change without asking
    #[arg(short, long)]
    pub yes: bool,
}

impl PushCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        if app.format.is_json() && !self.yes {
            bail!("--json needs --yes: the confirmation prompt is interactive");
        }

        let engine = app.build_engine().await?;
        let confirmer: Box<dyn IPushConfirmer> = if self.yes {
            Box::new(AcceptAll)
        } else {
            Box::new(PromptConfirmer::stdin())
        };
        info!(confirm = !self.yes, "Starting push");

        let report = engine.push(confirmer.as_ref()).await?;
        print_report(&*app.formatter(), app.format, "push", &report);
        Ok(())
    }
}

/// Discard pending local changes and restore the remote versions
#[derive(Debug, Args)]
pub struct ResetCommand {}

impl ResetCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        let engine = app.build_engine().await?;
        info!("Starting reset");

        let report = engine.reset().await?;
        print_report(&*app.formatter(), app.format, "reset", &report);
        Ok(())
    }
}
