//! Status command - Display synchronization status
//!
//! Provides the `vaultsync status` CLI command which shows:
//! 1. Pending operations in the operation log
//! 2. The size of the identity index
//! 3. When the last run completed
//! 4. Whether a change cursor and a credential are stored

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;

use vaultsync_core::{domain::SyncState, ports::IStateStore};

use crate::app::AppContext;

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Only print the number of pending operations
    #[arg(long)]
    pub count: bool,
}

fn last_synced(at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    (at != DateTime::<Utc>::default()).then_some(at)
}

pub fn status_json(state: &SyncState) -> serde_json::Value {
    let pending: Vec<serde_json::Value> = state
        .operations
        .iter()
        .map(|(path, kind)| serde_json::json!({"path": path.as_str(), "kind": kind.to_string()}))
        .collect();

    serde_json::json!({
        "pending": pending,
        "indexed_objects": state.identity_index.len(),
        "last_synced_at": last_synced(state.last_synced_at).map(|at| at.to_rfc3339()),
        "change_cursor": state.change_cursor.is_some(),
        "credential": state.credential.is_some(),
    })
}

impl StatusCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        let formatter = app.formatter();
        let store = app.state_store();
        let state = store.load().await.context("Failed to load sync state")?;

        if self.count {
            if app.format.is_json() {
                formatter.print_json(&serde_json::json!({"pending": state.operations.len()}));
            } else {
                println!("{}", state.operations.len());
            }
            return Ok(());
        }

        if app.format.is_json() {
            formatter.print_json(&status_json(&state));
            return Ok(());
        }

        formatter.success(&format!("State document: {}", store.path().display()));
        match last_synced(state.last_synced_at) {
            Some(at) => formatter.info(&format!(
                "Last synced:    {}",
                at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S")
            )),
            None => formatter.info("Last synced:    never"),
        }
        formatter.info(&format!(
            "Known objects:  {}",
            state.identity_index.len()
        ));
        formatter.info(&format!(
            "Change cursor:  {}",
            if state.change_cursor.is_some() { "stored" } else { "none" }
        ));
        if state.credential.is_none() {
            formatter.warn("No credential stored. Run 'vaultsync auth login'.");
        }

        if state.operations.is_empty() {
            formatter.info("No pending changes");
        } else {
            formatter.info(&format!("Pending changes ({}):", state.operations.len()));
            for (path, kind) in state.operations.iter() {
                formatter.info(&format!("  {:<7} {}", kind.to_string(), path));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultsync_core::domain::{OperationKind, VaultPath};

    #[test]
    fn test_fresh_state_was_never_synced() {
        let json = status_json(&SyncState::default());
        assert!(json["last_synced_at"].is_null());
        assert_eq!(json["pending"], serde_json::json!([]));
        assert_eq!(json["credential"], false);
    }

    #[test]
    fn test_pending_operations_are_listed() {
        let mut state = SyncState::default();
        state.record(VaultPath::new("a.md").unwrap(), OperationKind::Create);

        let json = status_json(&state);
        assert_eq!(json["pending"][0]["path"], "a.md");
        assert_eq!(json["pending"][0]["kind"], "create");
    }
}
