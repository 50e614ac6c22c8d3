//! VaultSync State - Sync state document persistence
//!
//! Stores the whole [`vaultsync_core::domain::SyncState`] as one JSON
//! document:
//! - Operation log
//! - Identity index
//! - Last synced timestamp and change cursor
//! - Stored credential
//!
//! ## Architecture
//!
//! This crate implements the `IStateStore` port from `vaultsync-core`. It is
//! a driven (secondary) adapter in the hexagonal architecture.
//!
//! ## Usage
//!
//! ```no_run
//! use vaultsync_core::ports::IStateStore;
//! use vaultsync_state::JsonStateStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = JsonStateStore::new("/home/user/.local/share/vaultsync/state.json");
//! let mut state = store.load().await?;
//! state.change_cursor = None;
//! store.save(&state).await?;
//! # Ok(())
//! # }
//! ```

pub mod store;

pub use store::{DocumentLock, JsonStateStore};

use std::path::PathBuf;

/// Errors that can occur while reading or writing the state document
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// The document could not be read or written
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document exists but is not a valid state document
    #[error("Malformed state document {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The state could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
