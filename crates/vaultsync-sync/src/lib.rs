//! VaultSync Sync - Reconciliation engines
//!
//! Provides:
//! - Depth batching and bounded concurrent execution of remote calls
//! - Minimum-operations deletion of hierarchical node sets
//! - Pull, push and reset engines over an explicit [`context::SyncContext`]
//! - A filesystem watcher that feeds local mutations into the operation log
//!
//! ## Modules
//!
//! - [`batch`] - Depth batcher, bounded batch executor, progress text
//! - [`planner`] - Minimum-operations deletion planner
//! - [`context`] - Shared context value and the exclusive syncing lock
//! - [`pull`] / [`push`] / [`reset`] - The three reconciliation algorithms
//! - [`engine`] - Facade running one engine per triggered sync
//! - [`filesystem`] - Local tree adapter (atomic writes, preserved mtimes)
//! - [`watcher`] - inotify-backed change notifications

pub mod batch;
pub mod context;
pub mod engine;
pub mod filesystem;
pub mod planner;
pub mod pull;
pub mod push;
pub mod reset;
pub mod watcher;

use std::fmt;

use thiserror::Error;
use vaultsync_core::{domain::errors::DomainError, ports::RemoteError};

/// The step of a run that a remote call belonged to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    FetchRemote,
    Deletions,
    Folders,
    Files,
    Modifies,
    ConfigFiles,
    Revert,
    Cursor,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::FetchRemote => "fetching remote changes",
            Phase::Deletions => "deletions",
            Phase::Folders => "folder creation",
            Phase::Files => "file transfer",
            Phase::Modifies => "modifications",
            Phase::ConfigFiles => "configuration files",
            Phase::Revert => "reverting local changes",
            Phase::Cursor => "change cursor",
        };
        f.write_str(s)
    }
}

/// Errors that can end a sync run
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote store was unreachable before the run started
    #[error("No connection to the remote store")]
    Connectivity,

    /// The stored credential was rejected; it has been cleared
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A remote call failed; the current phase was aborted
    #[error("Remote call failed during {phase}: {message}")]
    RemoteCall { phase: Phase, message: String },

    /// Reading or writing the local tree failed
    #[error("Local I/O error: {0}")]
    LocalIo(String),

    /// The state document could not be loaded or saved
    #[error("State error: {0}")]
    State(String),

    /// A second run was triggered while one is active
    #[error("A sync is already running")]
    AlreadySyncing,

    /// A domain-level error propagated from vaultsync-core
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::LocalIo(err.to_string())
    }
}

impl SyncError {
    /// Sorts an adapter failure into the taxonomy
    ///
    /// A [`RemoteError`] anywhere in the chain wins over an I/O error, so a
    /// transport failure wrapped around an `io::Error` still counts as remote.
    pub fn classify(phase: Phase, err: anyhow::Error) -> Self {
        let message = format!("{err:#}");

        if let Some(remote) = err.chain().find_map(|e| e.downcast_ref::<RemoteError>()) {
            return match remote {
                RemoteError::Unauthorized(_) => SyncError::Authentication(message),
                _ => SyncError::RemoteCall { phase, message },
            };
        }
        if err.chain().any(|e| e.is::<std::io::Error>()) {
            return SyncError::LocalIo(message);
        }
        if let Some(domain) = err.downcast_ref::<DomainError>() {
            return SyncError::Domain(domain.clone());
        }
        SyncError::RemoteCall { phase, message }
    }

    /// Returns true when the stored credential must be discarded
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        matches!(self, SyncError::Authentication(_))
    }
}

/// Shorthand for results inside the engines
pub type SyncResult<T> = Result<T, SyncError>;

/// Extension to classify `anyhow` results at a phase boundary
pub(crate) trait PhaseExt<T> {
    fn in_phase(self, phase: Phase) -> SyncResult<T>;
}

impl<T> PhaseExt<T> for anyhow::Result<T> {
    fn in_phase(self, phase: Phase) -> SyncResult<T> {
        self.map_err(|e| SyncError::classify(phase, e))
    }
}
