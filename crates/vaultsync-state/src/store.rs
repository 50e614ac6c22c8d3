//! JSON file state store
//!
//! Saves write the full document to a sibling temporary file, flush it, and
//! rename it over the previous document. A crash mid-save therefore leaves
//! either the old or the new document on disk, never a torn one.
//!
//! Processes sharing the document coordinate through an advisory lock on a
//! sibling `.lock` file. The document itself is replaced on every save, so
//! it cannot carry the lock.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs4::FileExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use vaultsync_core::{
    domain::SyncState,
    ports::{IStateStore, StateLock},
};

use crate::StateError;

/// [`IStateStore`] backed by one JSON file
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(suffix);
        self.path.with_file_name(name)
    }

    fn temp_path(&self) -> PathBuf {
        self.sibling(".tmp")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.sibling(".lock")
    }

    fn io(&self, path: &Path, source: std::io::Error) -> StateError {
        StateError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Reads the document; a missing file yields the default state
    pub async fn read(&self) -> Result<SyncState, StateError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No state document yet, starting fresh");
                return Ok(SyncState::default());
            }
            Err(e) => return Err(self.io(&self.path, e)),
        };

        let state: SyncState =
            serde_json::from_slice(&bytes).map_err(|source| StateError::Malformed {
                path: self.path.clone(),
                source,
            })?;
        debug!(
            path = %self.path.display(),
            operations = state.operations.len(),
            "Loaded state document"
        );
        Ok(state)
    }

    /// Blocks until this process holds the exclusive lock on the document
    pub async fn acquire(&self) -> Result<DocumentLock, StateError> {
        let path = self.lock_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io(parent, e))?;
        }

        let lock_path = path.clone();
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(&lock_path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await
        .map_err(|e| self.io(&path, std::io::Error::other(e)))?
        .map_err(|e| self.io(&path, e))?;

        debug!(path = %path.display(), "Locked state document");
        Ok(DocumentLock { file, path })
    }

    /// Replaces the document atomically
    pub async fn write(&self, state: &SyncState) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io(parent, e))?;
        }

        let json = serde_json::to_vec_pretty(state)?;
        let temp = self.temp_path();

        let mut file = tokio::fs::File::create(&temp)
            .await
            .map_err(|e| self.io(&temp, e))?;
        file.write_all(&json).await.map_err(|e| self.io(&temp, e))?;
        file.sync_all().await.map_err(|e| self.io(&temp, e))?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&temp, &self.path).await {
            warn!(path = %self.path.display(), error = %e, "Failed to replace state document");
            // Leave no stray temporary file behind.
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(self.io(&self.path, e));
        }

        debug!(path = %self.path.display(), bytes = json.len(), "Saved state document");
        Ok(())
    }
}

#[async_trait::async_trait]
impl IStateStore for JsonStateStore {
    async fn load(&self) -> anyhow::Result<SyncState> {
        Ok(self.read().await?)
    }

    async fn save(&self, state: &SyncState) -> anyhow::Result<()> {
        Ok(self.write(state).await?)
    }

    async fn lock(&self) -> anyhow::Result<StateLock> {
        Ok(Box::new(self.acquire().await?))
    }
}

/// Exclusive advisory lock on a state document, released on drop
#[derive(Debug)]
pub struct DocumentLock {
    file: File,
    path: PathBuf,
}

impl Drop for DocumentLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "Failed to unlock state document");
        }
    }
}
