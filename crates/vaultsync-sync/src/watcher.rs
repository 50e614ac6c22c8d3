//! File watching for the local tree
//!
//! Provides a [`FileWatcher`] that wraps the `notify` crate to monitor the
//! local tree, converting raw OS events into [`LocalEvent`] values addressed
//! by [`VaultPath`]. Each event is later recorded into the operation log
//! through [`crate::context::SyncContext::record_event`].
//!
//! ## Architecture
//!
//! ```text
//! inotify / fanotify
//!       │
//!       ▼
//!  FileWatcher  ──→  mpsc::channel  ──→  SyncContext::record_event  ──→  OperationLog
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use vaultsync_core::domain::{OperationKind, VaultPath};

use crate::filesystem::is_temp_file;

// ============================================================================
// LocalEvent
// ============================================================================

/// A mutation of the local tree, relative to its root
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalEvent {
    Created(VaultPath),
    Modified(VaultPath),
    Deleted(VaultPath),
    Renamed { from: VaultPath, to: VaultPath },
}

impl LocalEvent {
    /// Returns the primary path associated with this event
    ///
    /// For rename events, this returns the destination path.
    pub fn path(&self) -> &VaultPath {
        match self {
            LocalEvent::Created(p) | LocalEvent::Modified(p) | LocalEvent::Deleted(p) => p,
            LocalEvent::Renamed { to, .. } => to,
        }
    }

    /// The operation kind for single-path events
    pub fn kind(&self) -> Option<OperationKind> {
        match self {
            LocalEvent::Created(_) => Some(OperationKind::Create),
            LocalEvent::Modified(_) => Some(OperationKind::Modify),
            LocalEvent::Deleted(_) => Some(OperationKind::Delete),
            LocalEvent::Renamed { .. } => None,
        }
    }
}

// ============================================================================
// FileWatcher
// ============================================================================

/// Watches the local tree using the OS-native mechanism
///
/// On Linux this uses inotify. Dropping the watcher stops all watches.
///
/// ## Usage
///
/// ```ignore
/// let (mut watcher, rx) = FileWatcher::new("/home/user/Vault")?;
/// watcher.watch()?;
/// // rx.recv().await to get events
/// ```
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    /// Creates a watcher for the tree rooted at `root`
    ///
    /// Returns the watcher and a receiver yielding [`LocalEvent`]s. Events
    /// for temporary files and paths outside the root are dropped.
    ///
    /// # Errors
    /// Returns an error if the underlying OS watcher cannot be created
    pub fn new(root: impl Into<PathBuf>) -> Result<(Self, mpsc::Receiver<LocalEvent>)> {
        let root = root.into();
        let (event_tx, event_rx) = mpsc::channel::<LocalEvent>(1024);
        let handler_root = root.clone();

        info!(root = %root.display(), "Initializing file watcher");

        let watcher = RecommendedWatcher::new(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    if let Some(change) = map_notify_event(&handler_root, &event) {
                        if let Err(e) = event_tx.blocking_send(change) {
                            warn!(error = %e, "Failed to send change event (receiver dropped)");
                        }
                    }
                }
                Err(err) => {
                    error!(error = %err, "File watcher error");
                }
            },
            notify::Config::default(),
        )
        .context("Failed to create file watcher")?;

        Ok((Self { watcher, root }, event_rx))
    }

    /// Starts watching the root recursively
    ///
    /// # Errors
    /// Returns an error if the root cannot be watched (missing, permissions,
    /// inotify watch limit reached)
    pub fn watch(&mut self) -> Result<()> {
        info!(path = %self.root.display(), "Starting recursive watch");

        self.watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch path: {}", self.root.display()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

// ============================================================================
// Event mapping - notify::Event → LocalEvent
// ============================================================================

fn to_vault_path(root: &Path, path: &Path) -> Option<VaultPath> {
    if is_temp_file(path) {
        return None;
    }
    VaultPath::from_local(root, path).ok()
}

/// Converts a `notify::Event` into a [`LocalEvent`]
///
/// Maps the notify event kinds as follows:
/// - `Create(*)` -> `Created`
/// - `Modify(Name(Both))` with 2 paths -> `Renamed` (a rename out of a
///   temporary file becomes `Created` of the target)
/// - `Modify(Name(From))` -> `Deleted`, `Modify(Name(To))` -> `Created`
/// - `Remove(*)` -> `Deleted`
/// - `Modify(Metadata(*))` is ignored, other `Modify(*)` -> `Modified`
///
/// Returns `None` for access events, temporary files and paths that are
/// not strictly inside `root`.
pub fn map_notify_event(root: &Path, event: &notify::Event) -> Option<LocalEvent> {
    let paths = &event.paths;
    let first = || paths.first().and_then(|p| to_vault_path(root, p));

    let mapped = match &event.kind {
        EventKind::Create(_) => first().map(LocalEvent::Created),

        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if paths.len() >= 2 => {
            let from = to_vault_path(root, &paths[0]);
            let to = to_vault_path(root, &paths[1]);
            match (from, to) {
                (Some(from), Some(to)) => Some(LocalEvent::Renamed { from, to }),
                (None, Some(to)) => Some(LocalEvent::Created(to)),
                (Some(from), None) => Some(LocalEvent::Deleted(from)),
                (None, None) => None,
            }
        }

        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => first().map(LocalEvent::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => first().map(LocalEvent::Created),

        EventKind::Modify(ModifyKind::Metadata(_)) => None,

        EventKind::Modify(_) => first().map(LocalEvent::Modified),

        EventKind::Remove(_) => first().map(LocalEvent::Deleted),

        _ => None,
    };

    match &mapped {
        Some(change) => debug!(event = ?change, "Mapped notify event"),
        None => debug!(kind = ?event.kind, "Ignoring event"),
    }
    mapped
}
