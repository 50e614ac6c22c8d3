//! The explicit context value every engine runs against
//!
//! [`SyncContext`] owns the collaborator handles, the in-memory
//! [`SyncState`] and the exclusive syncing flag. Engines borrow it for the
//! length of a run; filesystem event handlers go through
//! [`SyncContext::record_event`], the single entry point that mutates the
//! operation log outside a run.
//!
//! The state document may be shared with other processes. A run holds the
//! store's lock from start to finish and begins from the stored document;
//! an event handler takes the same lock and edits the stored document
//! rather than saving its own, possibly stale, copy.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use vaultsync_core::{
    config::{Config, ConfigFilesConfig},
    domain::{OperationKind, SyncState, VaultPath},
    ports::{
        ILocalTree, INotificationService, IRemoteStore, IStateStore, NodeKind, Notification,
        LocalNode, RemoteError, StateLock,
    },
};

use crate::batch::{progress_message, progress_percent, DEFAULT_BATCH_SIZE};
use crate::watcher::LocalEvent;
use crate::{SyncError, SyncResult};

/// Identifier of the progress indicator the engines update
pub const PROGRESS_ID: &str = "vaultsync-sync";

/// How long after a run engine-made local changes are still ignored
const ECHO_GRACE: Duration = Duration::from_secs(2);

/// Tunables the engines read from configuration
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Bounded batch executor ceiling
    pub batch_size: usize,
    /// Upper bound for every remote call
    pub remote_timeout: Duration,
    pub config_files: ConfigFilesConfig,
}

impl SyncSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.sync.batch_size,
            remote_timeout: config.remote_timeout(),
            config_files: config.config_files.clone(),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            remote_timeout: Duration::from_secs(30),
            config_files: ConfigFilesConfig::default(),
        }
    }
}

// ============================================================================
// Echo suppression
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct EchoMark {
    recursive: bool,
    /// `None` while the run that made the change is still active
    until: Option<Instant>,
}

/// Paths the engines changed locally, so their watcher events are not
/// recorded as user mutations
#[derive(Debug, Default)]
struct EchoFilter {
    marks: HashMap<VaultPath, EchoMark>,
}

impl EchoFilter {
    fn mark(&mut self, path: &VaultPath, recursive: bool) {
        for ancestor in path.ancestors() {
            self.marks.entry(ancestor).or_insert(EchoMark {
                recursive: false,
                until: None,
            });
        }
        let mark = self.marks.entry(path.clone()).or_insert(EchoMark {
            recursive,
            until: None,
        });
        mark.recursive |= recursive;
        mark.until = None;
    }

    fn seal(&mut self, grace: Duration) {
        let until = Instant::now() + grace;
        for mark in self.marks.values_mut() {
            if mark.until.is_none() {
                mark.until = Some(until);
            }
        }
    }

    fn matches(&mut self, path: &VaultPath) -> bool {
        let now = Instant::now();
        self.marks
            .retain(|_, mark| mark.until.map_or(true, |until| until > now));

        self.marks.contains_key(path)
            || path
                .ancestors()
                .iter()
                .any(|a| self.marks.get(a).is_some_and(|m| m.recursive))
    }
}

// ============================================================================
// SyncContext
// ============================================================================

/// Collaborators and state shared by the pull, push and reset engines
pub struct SyncContext {
    remote: Arc<dyn IRemoteStore>,
    local: Arc<dyn ILocalTree>,
    store: Arc<dyn IStateStore>,
    notifier: Arc<dyn INotificationService>,
    settings: SyncSettings,
    state: Mutex<SyncState>,
    syncing: AtomicBool,
    echoes: StdMutex<EchoFilter>,
}

impl SyncContext {
    pub fn new(
        remote: Arc<dyn IRemoteStore>,
        local: Arc<dyn ILocalTree>,
        store: Arc<dyn IStateStore>,
        notifier: Arc<dyn INotificationService>,
        settings: SyncSettings,
        state: SyncState,
    ) -> Self {
        Self {
            remote,
            local,
            store,
            notifier,
            settings,
            state: Mutex::new(state),
            syncing: AtomicBool::new(false),
            echoes: StdMutex::new(EchoFilter::default()),
        }
    }

    /// Builds a context from the state document held by `store`
    ///
    /// # Errors
    /// Returns [`SyncError::State`] if the document cannot be loaded
    pub async fn load(
        remote: Arc<dyn IRemoteStore>,
        local: Arc<dyn ILocalTree>,
        store: Arc<dyn IStateStore>,
        notifier: Arc<dyn INotificationService>,
        settings: SyncSettings,
    ) -> SyncResult<Self> {
        let state = store
            .load()
            .await
            .map_err(|e| SyncError::State(format!("{e:#}")))?;
        Ok(Self::new(remote, local, store, notifier, settings, state))
    }

    pub fn remote(&self) -> &dyn IRemoteStore {
        self.remote.as_ref()
    }

    pub fn local(&self) -> &dyn ILocalTree {
        self.local.as_ref()
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// A copy of the current state
    pub async fn state(&self) -> SyncState {
        self.state.lock().await.clone()
    }

    /// Runs `f` with exclusive access to the state
    ///
    /// The lock is never held across a remote call.
    pub async fn with_state<R>(&self, f: impl FnOnce(&mut SyncState) -> R) -> R {
        let mut state = self.state.lock().await;
        f(&mut state)
    }

    /// Writes the current state to the state store
    pub async fn persist(&self) -> SyncResult<()> {
        let snapshot = self.state().await;
        self.store.save(&snapshot).await.map_err(state_error)
    }

    /// Waits for exclusive use of the state document
    pub async fn lock_state(&self) -> SyncResult<StateLock> {
        self.store.lock().await.map_err(state_error)
    }

    /// Replaces the in-memory state with the stored document
    ///
    /// Call with the state lock held.
    pub async fn reload(&self) -> SyncResult<()> {
        let stored = self.store.load().await.map_err(state_error)?;
        *self.state.lock().await = stored;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Syncing lock
    // ------------------------------------------------------------------------

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    /// Takes the syncing flag, or returns `None` if a run is active
    pub fn try_begin(&self) -> Option<SyncGuard<'_>> {
        self.syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| SyncGuard { ctx: self })
    }

    // ------------------------------------------------------------------------
    // Remote calls
    // ------------------------------------------------------------------------

    /// Awaits a remote call, failing it once the configured timeout passes
    pub async fn call<T>(
        &self,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        let limit = self.settings.remote_timeout;
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(limit).into()),
        }
    }

    // ------------------------------------------------------------------------
    // Local mutations made by the engines
    // ------------------------------------------------------------------------

    fn mark_echo(&self, path: &VaultPath, recursive: bool) {
        if let Ok(mut echoes) = self.echoes.lock() {
            echoes.mark(path, recursive);
        }
    }

    fn is_echo(&self, path: &VaultPath) -> bool {
        self.echoes
            .lock()
            .map(|mut echoes| echoes.matches(path))
            .unwrap_or(false)
    }

    pub(crate) async fn write_local(
        &self,
        path: &VaultPath,
        content: &[u8],
        modified: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        self.mark_echo(path, false);
        self.local.write(path, content, modified).await
    }

    pub(crate) async fn stamp_local(
        &self,
        path: &VaultPath,
        modified: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        self.mark_echo(path, false);
        self.local.set_modified_time(path, modified).await
    }

    pub(crate) async fn create_local_folder(&self, path: &VaultPath) -> anyhow::Result<()> {
        self.mark_echo(path, false);
        self.local.create_folder(path).await
    }

    pub(crate) async fn delete_local(&self, path: &VaultPath) -> anyhow::Result<()> {
        self.mark_echo(path, true);
        self.local.delete(path).await
    }

    // ------------------------------------------------------------------------
    // User feedback
    // ------------------------------------------------------------------------

    pub(crate) async fn progress(&self, min: u32, max: u32, completed: usize, total: usize) {
        let message = progress_message(min, max, completed, total);
        let percent = f64::from(progress_percent(min, max, completed, total));
        if let Err(e) = self
            .notifier
            .show_progress(PROGRESS_ID, &message, percent)
            .await
        {
            debug!(error = %e, "Failed to report progress");
        }
    }

    pub(crate) async fn clear_progress(&self) {
        if let Err(e) = self.notifier.clear_progress(PROGRESS_ID).await {
            debug!(error = %e, "Failed to clear progress");
        }
    }

    pub(crate) async fn notify(&self, notification: Notification) {
        if let Err(e) = self.notifier.notify(&notification).await {
            warn!(error = %e, title = %notification.title, "Failed to deliver notification");
        }
    }

    // ------------------------------------------------------------------------
    // Filesystem events
    // ------------------------------------------------------------------------

    fn is_ignored(&self, path: &VaultPath) -> bool {
        self.settings.config_files.contains(path) || self.is_echo(path)
    }

    /// Records a local mutation into the stored operation log
    ///
    /// Events inside the configuration directory and events caused by the
    /// engines' own writes are dropped. A created or renamed-in folder also
    /// records a Create for everything below it. Returns whether anything
    /// was recorded.
    #[instrument(skip(self), fields(path = %event.path()))]
    pub async fn record_event(&self, event: LocalEvent) -> SyncResult<bool> {
        let event = match event {
            LocalEvent::Renamed { from, to } => {
                match (self.is_ignored(&from), self.is_ignored(&to)) {
                    (true, true) => return Ok(false),
                    (true, false) => LocalEvent::Created(to),
                    (false, true) => LocalEvent::Deleted(from),
                    (false, false) => LocalEvent::Renamed { from, to },
                }
            }
            other if self.is_ignored(other.path()) => {
                debug!("ignoring event");
                return Ok(false);
            }
            other => other,
        };

        let subtree_root = match &event {
            LocalEvent::Created(p) | LocalEvent::Renamed { to: p, .. } => Some(p.clone()),
            _ => None,
        };
        let mut descendants = Vec::new();
        if let Some(root) = subtree_root {
            let kind = self
                .local
                .kind(&root)
                .await
                .map_err(|e| SyncError::LocalIo(format!("{e:#}")))?;
            if kind == Some(NodeKind::Folder) {
                descendants = self
                    .local
                    .walk(Some(&root))
                    .await
                    .map_err(|e| SyncError::LocalIo(format!("{e:#}")))?;
            }
        }

        let _lock = self.lock_state().await?;
        let mut stored = self.store.load().await.map_err(state_error)?;
        apply_event(&mut stored, &event, &descendants);
        self.store.save(&stored).await.map_err(state_error)?;

        let mut state = self.state.lock().await;
        if self.is_syncing() {
            // The active run saves its own copy; keep the event in it.
            apply_event(&mut state, &event, &descendants);
        } else {
            *state = stored;
        }
        Ok(true)
    }
}

/// Holds the syncing flag for the duration of a run
pub struct SyncGuard<'a> {
    ctx: &'a SyncContext,
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut echoes) = self.ctx.echoes.lock() {
            echoes.seal(ECHO_GRACE);
        }
        self.ctx.syncing.store(false, Ordering::SeqCst);
    }
}

// ============================================================================
// State helpers shared by the engines
// ============================================================================

fn state_error(err: anyhow::Error) -> SyncError {
    SyncError::State(format!("{err:#}"))
}

/// Records `event`, plus a Create for every node below a created folder
fn apply_event(state: &mut SyncState, event: &LocalEvent, descendants: &[LocalNode]) {
    match event {
        LocalEvent::Renamed { from, to } => state.record_rename(from.clone(), to.clone()),
        single => {
            if let Some(kind) = single.kind() {
                state.record(single.path().clone(), kind);
            }
        }
    }
    for node in descendants {
        state.record(node.path.clone(), OperationKind::Create);
    }
}

/// Clears pending operations on `path` and everything below it
pub(crate) fn clear_subtree_ops(state: &mut SyncState, path: &VaultPath) {
    let doomed: Vec<VaultPath> = state
        .operations
        .iter()
        .map(|(p, _)| p)
        .filter(|p| *p == path || p.is_descendant_of(path))
        .cloned()
        .collect();
    for p in doomed {
        state.operations.clear(&p);
    }
}

/// Drops identity entries for `path` and everything below it
pub(crate) fn forget_subtree_ids(state: &mut SyncState, path: &VaultPath) {
    let doomed: Vec<VaultPath> = state
        .identity_index
        .iter()
        .map(|(_, p)| p)
        .filter(|p| *p == path || p.is_descendant_of(path))
        .cloned()
        .collect();
    for p in doomed {
        state.identity_index.remove_path(&p);
    }
}
