//! State store port (driven/secondary port)
//!
//! Persists the [`SyncState`] document: operation log, identity index,
//! last-synced timestamp, change cursor and stored credential.
//!
//! Several processes may share one document (a long-running watcher next to
//! one-shot pull/push runs). Writers take [`IStateStore::lock`] and re-read
//! the document under it, so no process overwrites another's results with a
//! stale copy.

use crate::domain::SyncState;

/// Exclusive hold on the state document, released when dropped
pub type StateLock = Box<dyn Send + Sync>;

/// Port trait for loading and saving the sync state document
///
/// `load` returns a default state when nothing has been saved yet.
/// `save` must replace the previous document atomically.
#[async_trait::async_trait]
pub trait IStateStore: Send + Sync {
    async fn load(&self) -> anyhow::Result<SyncState>;

    async fn save(&self, state: &SyncState) -> anyhow::Result<()>;

    /// Waits until no other holder has the document locked
    ///
    /// Stores that are never shared between processes need no lock.
    async fn lock(&self) -> anyhow::Result<StateLock> {
        Ok(Box::new(()))
    }
}
