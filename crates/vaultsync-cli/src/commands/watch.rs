//! Watch command - Record local changes as they happen
//!
//! Provides the `vaultsync watch` CLI command which:
//! 1. Pulls once on startup when the remote store is reachable
//! 2. Watches the local root and records every mutation in the operation log
//! 3. Persists the state after each recorded event
//! 4. Stops cleanly on SIGINT or SIGTERM

use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use vaultsync_sync::watcher::FileWatcher;

use crate::app::AppContext;
use crate::output::print_report;

#[derive(Debug, Args)]
pub struct WatchCommand {
    /// Skip the startup pull even if the configuration enables it
    #[arg(long)]
    pub no_pull: bool,
}

impl WatchCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        let formatter = app.formatter();
        let engine = app.build_engine().await?;

        if app.config.sync.pull_on_startup && !self.no_pull {
            match engine.startup_pull().await {
                Ok(Some(report)) => print_report(&*formatter, app.format, "pull", &report),
                Ok(None) => formatter.warn("Remote store unreachable, startup pull skipped"),
                // Already announced by the engine; keep watching.
                Err(e) => warn!(error = %e, "Startup pull failed"),
            }
        }

        let root = app.config.sync.local_root.clone();
        let (mut watcher, mut events) = FileWatcher::new(root.clone())?;
        watcher.watch()?;

        let shutdown = CancellationToken::new();
        tokio::spawn(shutdown_signal(shutdown.clone()));

        formatter.success(&format!("Watching {} (Ctrl+C to stop)", root.display()));
        let ctx = engine.context().clone();
        let mut recorded = 0u64;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => {
                    let Some(event) = event else {
                        warn!("File watcher channel closed");
                        break;
                    };
                    match ctx.record_event(event).await {
                        Ok(true) => recorded += 1,
                        Ok(false) => {}
                        Err(e) => {
                            error!(error = %e, "Failed to record local change");
                            formatter.warn(&format!("Failed to record local change: {e}"));
                        }
                    }
                }
            }
        }

        drop(watcher);
        info!(recorded, "Watch stopped");
        if app.format.is_json() {
            formatter.print_json(&serde_json::json!({"action": "watch", "recorded": recorded}));
        } else {
            formatter.success(&format!("Stopped watching, {recorded} change(s) recorded"));
        }
        Ok(())
    }
}

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            debug!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            debug!("Received SIGTERM");
        }
    }

    token.cancel();
}
