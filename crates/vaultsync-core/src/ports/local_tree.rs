//! Local tree port (driven/secondary port)
//!
//! This module defines the interface for the local file tree the remote
//! store is mirrored into. All paths are [`VaultPath`]s relative to the
//! tree root; adapters resolve them against their configured root.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::VaultPath;

/// Kind of a local node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Folder,
}

/// A node of the local tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalNode {
    pub path: VaultPath,
    pub kind: NodeKind,
}

impl LocalNode {
    #[must_use]
    pub fn file(path: VaultPath) -> Self {
        Self {
            path,
            kind: NodeKind::File,
        }
    }

    #[must_use]
    pub fn folder(path: VaultPath) -> Self {
        Self {
            path,
            kind: NodeKind::Folder,
        }
    }

    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }
}

/// Port trait for the local file tree
///
/// ## Implementation Notes
///
/// - `write` creates missing parent folders and sets the file's
///   modification time to `modified`.
/// - `delete` removes folders recursively and treats a missing path as
///   already deleted.
/// - `walk` lists every node strictly below `under` (or the whole tree).
#[async_trait::async_trait]
pub trait ILocalTree: Send + Sync {
    /// Returns the kind of the node at `path`, or `None` if nothing is there
    async fn kind(&self, path: &VaultPath) -> anyhow::Result<Option<NodeKind>>;

    /// Reads a file's content
    async fn read(&self, path: &VaultPath) -> anyhow::Result<Vec<u8>>;

    /// Writes a file's content and sets its modification time
    async fn write(
        &self,
        path: &VaultPath,
        content: &[u8],
        modified: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    /// Returns a node's modification time
    async fn modified_time(&self, path: &VaultPath) -> anyhow::Result<DateTime<Utc>>;

    /// Sets a file's modification time without touching its content
    async fn set_modified_time(
        &self,
        path: &VaultPath,
        modified: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    /// Creates a folder and any missing ancestors
    async fn create_folder(&self, path: &VaultPath) -> anyhow::Result<()>;

    /// Deletes a file or a whole folder
    async fn delete(&self, path: &VaultPath) -> anyhow::Result<()>;

    /// Lists every node below `under` (the whole tree when `None`)
    async fn walk(&self, under: Option<&VaultPath>) -> anyhow::Result<Vec<LocalNode>>;

    /// Returns true if anything exists at `path`
    async fn exists(&self, path: &VaultPath) -> anyhow::Result<bool> {
        Ok(self.kind(path).await?.is_some())
    }
}
