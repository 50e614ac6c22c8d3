//! Adapter wiring shared by the commands
//!
//! Loads the configuration once, then builds the state store, the remote
//! store, the local tree and the engine from it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;

use vaultsync_core::{config::Config, ports::IStateStore};
use vaultsync_drive::DriveRemoteStore;
use vaultsync_state::JsonStateStore;
use vaultsync_sync::{
    context::{SyncContext, SyncSettings},
    engine::SyncEngine,
    filesystem::LocalTreeAdapter,
};

use crate::notifier::TerminalNotifier;
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Global options and the loaded configuration
pub struct AppContext {
    pub format: OutputFormat,
    pub quiet: bool,
    pub config_path: PathBuf,
    pub config: Config,
}

impl AppContext {
    /// Loads the configuration from `--config`, or the default location
    ///
    /// An explicit path must exist; a missing default file means defaults.
    pub fn load(format: OutputFormat, quiet: bool, config: Option<&str>) -> Result<Self> {
        let (config_path, config) = match config {
            Some(path) => {
                let path = PathBuf::from(path);
                let config = Config::load(&path)
                    .with_context(|| format!("Failed to load configuration {}", path.display()))?;
                (path, config)
            }
            None => {
                let path = Config::default_path();
                let config = Config::load_or_default(&path);
                (path, config)
            }
        };

        Ok(Self {
            format,
            quiet,
            config_path,
            config,
        })
    }

    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format.is_json())
    }

    pub fn state_store(&self) -> JsonStateStore {
        JsonStateStore::new(self.config.state.path.clone())
    }

    /// Builds an engine over every adapter
    ///
    /// # Errors
    /// Fails if the configuration is invalid, the local root cannot be
    /// created, or the state document cannot be read.
    pub async fn build_engine(&self) -> Result<SyncEngine> {
        let errors = self.config.validate();
        if !errors.is_empty() {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            bail!(
                "Invalid configuration ({}): {}",
                self.config_path.display(),
                messages.join("; ")
            );
        }

        let root = &self.config.sync.local_root;
        tokio::fs::create_dir_all(root)
            .await
            .with_context(|| format!("Failed to create local root {}", root.display()))?;

        let store = Arc::new(self.state_store());
        let state = store.load().await.context("Failed to load sync state")?;
        if state.credential.is_none() {
            bail!("No credential stored. Run 'vaultsync auth login' first.");
        }

        let remote = DriveRemoteStore::from_config(&self.config.remote, state.credential.clone())?;
        let ctx = SyncContext::new(
            Arc::new(remote),
            Arc::new(LocalTreeAdapter::new(root.clone())),
            store,
            Arc::new(TerminalNotifier::new(self.format, self.quiet)),
            SyncSettings::from_config(&self.config),
            state,
        );

        info!(
            root = %root.display(),
            vault = %self.config.remote.vault_name,
            "Sync engine ready"
        );
        Ok(SyncEngine::new(Arc::new(ctx)))
    }
}
