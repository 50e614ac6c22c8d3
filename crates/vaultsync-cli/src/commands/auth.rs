//! Auth commands - Store, remove and check the remote credential
//!
//! Provides the `vaultsync auth` CLI subcommands which:
//! 1. `login`  - Stores a refresh credential in the state document,
//!    optionally verifying it against the token endpoint first.
//! 2. `logout` - Removes the stored credential.
//! 3. `status` - Shows whether a credential is stored.
//!
//! Obtaining the credential is outside this tool; `login` only records it.

use std::io::BufRead;

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use vaultsync_core::{
    domain::Credential,
    ports::{IRemoteStore, IStateStore},
};
use vaultsync_drive::DriveRemoteStore;

use crate::app::AppContext;
use crate::output::OutputFormatter;

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Store a refresh credential
    Login {
        /// The credential; read from stdin when omitted
        #[arg(long)]
        credential: Option<String>,
        /// Exchange the credential for an access token before storing it
        #[arg(long)]
        verify: bool,
    },
    /// Remove the stored credential
    Logout,
    /// Check whether a credential is stored
    Status,
}

impl AuthCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        let fmt = app.formatter();
        match self {
            AuthCommand::Login { credential, verify } => {
                self.execute_login(app, credential.as_deref(), *verify, &*fmt)
                    .await
            }
            AuthCommand::Logout => self.execute_logout(app, &*fmt).await,
            AuthCommand::Status => self.execute_status(app, &*fmt).await,
        }
    }

    async fn execute_login(
        &self,
        app: &AppContext,
        credential: Option<&str>,
        verify: bool,
        fmt: &dyn OutputFormatter,
    ) -> Result<()> {
        let secret = match credential {
            Some(secret) => secret.to_string(),
            None => {
                fmt.info("Paste the refresh credential and press Enter:");
                let mut line = String::new();
                std::io::stdin()
                    .lock()
                    .read_line(&mut line)
                    .context("Failed to read credential from stdin")?;
                line
            }
        };
        let credential = Credential::new(secret)?;

        if verify {
            let remote = DriveRemoteStore::from_config(&app.config.remote, Some(credential.clone()))?;
            remote
                .change_start_cursor()
                .await
                .context("The credential was not accepted")?;
            fmt.info("Credential verified");
        }

        let store = app.state_store();
        let _lock = store.acquire().await.context("Failed to lock sync state")?;
        let mut state = store.load().await.context("Failed to load sync state")?;
        state.credential = Some(credential);
        store.save(&state).await.context("Failed to save sync state")?;

        info!(path = %store.path().display(), "Credential stored");
        if app.format.is_json() {
            fmt.print_json(&serde_json::json!({"action": "login", "success": true, "verified": verify}));
        } else {
            fmt.success("Credential stored");
        }
        Ok(())
    }

    async fn execute_logout(&self, app: &AppContext, fmt: &dyn OutputFormatter) -> Result<()> {
        let store = app.state_store();
        let _lock = store.acquire().await.context("Failed to lock sync state")?;
        let mut state = store.load().await.context("Failed to load sync state")?;
        let had_credential = state.credential.take().is_some();
        if had_credential {
            store.save(&state).await.context("Failed to save sync state")?;
            info!("Credential removed");
        }

        if app.format.is_json() {
            fmt.print_json(&serde_json::json!({"action": "logout", "removed": had_credential}));
        } else if had_credential {
            fmt.success("Credential removed");
        } else {
            fmt.info("No credential was stored");
        }
        Ok(())
    }

    async fn execute_status(&self, app: &AppContext, fmt: &dyn OutputFormatter) -> Result<()> {
        let state = app
            .state_store()
            .load()
            .await
            .context("Failed to load sync state")?;
        let stored = state.credential.is_some();

        if app.format.is_json() {
            fmt.print_json(&serde_json::json!({
                "credential": stored,
                "vault": app.config.remote.vault_name,
            }));
        } else if stored {
            fmt.success(&format!(
                "Credential stored for vault '{}'",
                app.config.remote.vault_name
            ));
        } else {
            fmt.warn("No credential stored. Run 'vaultsync auth login'.");
        }
        Ok(())
    }
}
