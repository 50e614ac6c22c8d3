//! Local tree adapter (secondary/driven adapter)
//!
//! Implements [`ILocalTree`] using `tokio::fs` for async file operations.
//!
//! ## Design Decisions
//!
//! - **Rooted paths**: every [`VaultPath`] is resolved against the adapter's
//!   root, so nothing outside the local tree is ever touched.
//! - **Atomic writes**: content goes to a hidden temporary sibling first,
//!   gets its modification time set, and is then renamed over the target.
//! - **Idempotent deletes**: deleting a missing path succeeds, which keeps
//!   re-runs after an interruption harmless.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use vaultsync_core::{
    domain::VaultPath,
    ports::{ILocalTree, LocalNode, NodeKind},
};

/// Suffix of in-flight temporary files; the watcher and `walk` skip them.
pub const TEMP_SUFFIX: &str = ".vaultsync-tmp";

/// Adapter that bridges the [`ILocalTree`] port to a directory on disk.
#[derive(Debug, Clone)]
pub struct LocalTreeAdapter {
    root: PathBuf,
}

impl LocalTreeAdapter {
    /// Create an adapter rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &VaultPath) -> PathBuf {
        path.to_local(&self.root)
    }
}

/// Returns true for temporary files written by this adapter.
#[must_use]
pub fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(TEMP_SUFFIX))
}

fn temp_path_for(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}{TEMP_SUFFIX}"))
}

/// Sets the modification time of the file at `target`
async fn stamp(target: PathBuf, modified: DateTime<Utc>) -> anyhow::Result<()> {
    let mtime = SystemTime::from(modified);
    tokio::task::spawn_blocking(move || {
        std::fs::OpenOptions::new()
            .write(true)
            .open(&target)
            .and_then(|f| f.set_modified(mtime))
    })
    .await??;
    Ok(())
}

#[async_trait::async_trait]
impl ILocalTree for LocalTreeAdapter {
    #[instrument(skip(self), fields(path = %path))]
    async fn kind(&self, path: &VaultPath) -> anyhow::Result<Option<NodeKind>> {
        match tokio::fs::metadata(self.resolve(path)).await {
            Ok(m) if m.is_dir() => Ok(Some(NodeKind::Folder)),
            Ok(_) => Ok(Some(NodeKind::File)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to stat {path}")),
        }
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn read(&self, path: &VaultPath) -> anyhow::Result<Vec<u8>> {
        let data = tokio::fs::read(self.resolve(path))
            .await
            .with_context(|| format!("Failed to read {path}"))?;
        debug!(bytes = data.len(), "file read complete");
        Ok(data)
    }

    #[instrument(skip(self, content), fields(path = %path, bytes = content.len()))]
    async fn write(
        &self,
        path: &VaultPath,
        content: &[u8],
        modified: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let target = self.resolve(path);

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create parent folder of {path}"))?;
        }

        let tmp_path = temp_path_for(&target);
        tokio::fs::write(&tmp_path, content)
            .await
            .with_context(|| format!("Failed to write {path}"))?;

        stamp(tmp_path.clone(), modified)
            .await
            .with_context(|| format!("Failed to set modification time of {path}"))?;

        tokio::fs::rename(&tmp_path, &target)
            .await
            .with_context(|| format!("Failed to move {path} into place"))?;

        debug!("write complete");
        Ok(())
    }

    async fn modified_time(&self, path: &VaultPath) -> anyhow::Result<DateTime<Utc>> {
        let metadata = tokio::fs::metadata(self.resolve(path))
            .await
            .with_context(|| format!("Failed to stat {path}"))?;
        Ok(DateTime::<Utc>::from(metadata.modified()?))
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn set_modified_time(
        &self,
        path: &VaultPath,
        modified: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        stamp(self.resolve(path), modified)
            .await
            .with_context(|| format!("Failed to set modification time of {path}"))
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn create_folder(&self, path: &VaultPath) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(self.resolve(path))
            .await
            .with_context(|| format!("Failed to create folder {path}"))?;
        debug!("folder created");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn delete(&self, path: &VaultPath) -> anyhow::Result<()> {
        let p = self.resolve(path);
        let metadata = match tokio::fs::symlink_metadata(&p).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("already gone");
                return Ok(());
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to stat {path}")),
        };

        let result = if metadata.is_dir() {
            tokio::fs::remove_dir_all(&p).await
        } else {
            tokio::fs::remove_file(&p).await
        };
        result.with_context(|| format!("Failed to delete {path}"))?;

        debug!("delete complete");
        Ok(())
    }

    async fn walk(&self, under: Option<&VaultPath>) -> anyhow::Result<Vec<LocalNode>> {
        let start = under.map_or_else(|| self.root.clone(), |p| self.resolve(p));
        let mut nodes = Vec::new();
        let mut pending = vec![start];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to list {}", dir.display()))
                }
            };

            while let Some(entry) = entries.next_entry().await? {
                let local = entry.path();
                if is_temp_file(&local) {
                    continue;
                }
                let Ok(path) = VaultPath::from_local(&self.root, &local) else {
                    debug!(path = %local.display(), "skipping non-vault path");
                    continue;
                };
                if entry.file_type().await?.is_dir() {
                    pending.push(local);
                    nodes.push(LocalNode::folder(path));
                } else {
                    nodes.push(LocalNode::file(path));
                }
            }
        }

        nodes.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(nodes)
    }
}
