//! In-memory collaborators for driving the engines end to end
//!
//! The local tree is the real [`LocalTreeAdapter`] over a temporary
//! directory; the remote store, state store and notifier are fakes that
//! record what the engines asked of them. Engine runs start from the saved
//! state document, so everything a test sets up goes through the store.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tempfile::TempDir;

use vaultsync_core::{
    domain::{
        remote_object::{PATH_PROPERTY, VAULT_PROPERTY},
        ChangeCursor, ChangeEntry, Operation, OperationKind, RemoteId, RemoteObject, SyncState,
        VaultPath, FOLDER_MIME_TYPE,
    },
    ports::{
        ChangeFeed, DateComparison, INotificationService, IPushConfirmer, IRemoteStore,
        IStateStore, NewObject, Notification, ObjectQuery, QueryMatch, RemoteError, StringSearch,
    },
};
use vaultsync_sync::{
    context::{SyncContext, SyncSettings},
    engine::SyncEngine,
    filesystem::LocalTreeAdapter,
};

pub fn p(s: &str) -> VaultPath {
    VaultPath::new(s).unwrap()
}

// ============================================================================
// FakeRemote
// ============================================================================

#[derive(Debug, Clone)]
pub struct FakeEntry {
    pub object: RemoteObject,
    pub parent: Option<RemoteId>,
    pub content: Vec<u8>,
}

#[derive(Default)]
pub struct FakeRemote {
    entries: Mutex<BTreeMap<String, FakeEntry>>,
    feed: Mutex<Vec<ChangeEntry>>,
    next_id: AtomicUsize,
    pub offline: AtomicBool,
    pub unauthorized: AtomicBool,
    pub fail_uploads: AtomicBool,
    pub calls: AtomicUsize,
    pub batch_delete_calls: AtomicUsize,
    pub create_folder_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
    /// Runs at the start of every new-file upload
    pub on_upload: Mutex<Option<Box<dyn Fn(&VaultPath) + Send>>>,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn fresh_id(&self) -> RemoteId {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        RemoteId::new(format!("id-{n}")).unwrap()
    }

    fn object(&self, id: RemoteId, path: &VaultPath, folder: bool, at: DateTime<Utc>) -> RemoteObject {
        let properties = HashMap::from([
            (PATH_PROPERTY.to_string(), path.as_str().to_string()),
            (VAULT_PROPERTY.to_string(), "test-vault".to_string()),
        ]);
        RemoteObject {
            id,
            name: path.file_name().to_string(),
            mime_type: if folder {
                FOLDER_MIME_TYPE.to_string()
            } else {
                "text/markdown".to_string()
            },
            description: None,
            starred: false,
            properties,
            modified_time: at,
        }
    }

    fn insert(&self, path: &VaultPath, folder: bool, content: Vec<u8>, at: DateTime<Utc>) -> RemoteId {
        let parent = path.parent().and_then(|parent| self.id_of(&parent));
        let id = self.fresh_id();
        let object = self.object(id.clone(), path, folder, at);
        self.entries.lock().unwrap().insert(
            id.as_str().to_string(),
            FakeEntry {
                object,
                parent,
                content,
            },
        );
        id
    }

    /// Seeds a folder as if another device had pushed it
    pub fn put_folder(&self, path: &str) -> RemoteId {
        self.insert(&p(path), true, Vec::new(), Utc::now())
    }

    /// Seeds a file as if another device had pushed it
    pub fn put_file(&self, path: &str, content: &str) -> RemoteId {
        self.insert(&p(path), false, content.as_bytes().to_vec(), Utc::now())
    }

    /// Replaces a file's content as if another device had modified it
    pub fn edit_file(&self, path: &str, content: &str) {
        let id = self.id_of(&p(path)).unwrap();
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.get_mut(id.as_str()).unwrap();
        entry.content = content.as_bytes().to_vec();
        entry.object.modified_time = Utc::now();
    }

    /// Removes an object and everything below it, recording the change feed entries
    pub fn remove(&self, path: &str) {
        let root = p(path);
        let mut entries = self.entries.lock().unwrap();
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(_, e)| {
                e.object
                    .path()
                    .is_some_and(|q| q == root || q.is_descendant_of(&root))
            })
            .map(|(id, _)| id.clone())
            .collect();

        let mut feed = self.feed.lock().unwrap();
        for id in doomed {
            entries.remove(&id);
            feed.push(ChangeEntry {
                file_id: RemoteId::new(id).unwrap(),
                removed: true,
                time: Utc::now(),
            });
        }
    }

    pub fn id_of(&self, path: &VaultPath) -> Option<RemoteId> {
        self.entries
            .lock()
            .unwrap()
            .values()
            .find(|e| e.object.path().as_ref() == Some(path))
            .map(|e| e.object.id.clone())
    }

    pub fn entry(&self, path: &str) -> Option<FakeEntry> {
        let path = p(path);
        self.entries
            .lock()
            .unwrap()
            .values()
            .find(|e| e.object.path().as_ref() == Some(&path))
            .cloned()
    }

    pub fn content(&self, path: &str) -> Option<String> {
        self.entry(path)
            .map(|e| String::from_utf8(e.content).unwrap())
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .entries
            .lock()
            .unwrap()
            .values()
            .filter_map(|e| e.object.path())
            .map(|p| p.as_str().to_string())
            .collect();
        paths.sort();
        paths
    }

    fn begin_call(&self) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unauthorized.load(Ordering::SeqCst) {
            return Err(RemoteError::Unauthorized("token expired".to_string()).into());
        }
        Ok(())
    }
}

fn string_matches(value: &str, search: &StringSearch) -> bool {
    match search {
        StringSearch::Equals(s) => value == s,
        StringSearch::Contains(s) => value.contains(s.as_str()),
        StringSearch::Not(s) => value != s,
    }
}

fn clause_matches(object: &RemoteObject, m: &QueryMatch) -> bool {
    if m.id.as_ref().is_some_and(|id| *id != object.id) {
        return false;
    }
    if !m.name.iter().all(|s| string_matches(&object.name, s)) {
        return false;
    }
    if !m.mime_type.iter().all(|s| string_matches(&object.mime_type, s)) {
        return false;
    }
    for (key, search) in &m.properties {
        match object.properties.get(key) {
            Some(value) if string_matches(value, search) => {}
            _ => return false,
        }
    }
    match m.modified_time {
        Some(DateComparison::Gt(t)) => object.modified_time > t,
        Some(DateComparison::Lt(t)) => object.modified_time < t,
        Some(DateComparison::Eq(t)) => object.modified_time == t,
        None => true,
    }
}

#[async_trait::async_trait]
impl IRemoteStore for FakeRemote {
    async fn check_connection(&self) -> bool {
        !self.offline.load(Ordering::SeqCst)
    }

    async fn search(&self, query: &ObjectQuery) -> anyhow::Result<Vec<RemoteObject>> {
        self.begin_call()?;
        Ok(self
            .entries
            .lock()
            .unwrap()
            .values()
            .map(|e| &e.object)
            .filter(|o| query.matches.is_empty() || query.matches.iter().any(|m| clause_matches(o, m)))
            .cloned()
            .collect())
    }

    async fn change_start_cursor(&self) -> anyhow::Result<ChangeCursor> {
        self.begin_call()?;
        let len = self.feed.lock().unwrap().len();
        Ok(ChangeCursor::new(len.to_string())?)
    }

    async fn changes_since(&self, cursor: &ChangeCursor) -> anyhow::Result<ChangeFeed> {
        self.begin_call()?;
        let start: usize = cursor.as_str().parse()?;
        let feed = self.feed.lock().unwrap();
        Ok(ChangeFeed {
            changes: feed.iter().skip(start).cloned().collect(),
            next_cursor: Some(ChangeCursor::new(feed.len().to_string())?),
        })
    }

    async fn create_folder(&self, folder: &NewObject) -> anyhow::Result<RemoteId> {
        self.begin_call()?;
        self.create_folder_calls.fetch_add(1, Ordering::SeqCst);
        let id = self.fresh_id();
        let object = self.object(id.clone(), &folder.path, true, Utc::now());
        self.entries.lock().unwrap().insert(
            id.as_str().to_string(),
            FakeEntry {
                object,
                parent: folder.parent.clone(),
                content: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn upload_file(&self, file: &NewObject, content: Vec<u8>) -> anyhow::Result<RemoteId> {
        self.begin_call()?;
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = self.on_upload.lock().unwrap().as_ref() {
            hook(&file.path);
        }
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(RemoteError::Rejected {
                status: 500,
                body: "backend error".to_string(),
            }
            .into());
        }
        let id = self.fresh_id();
        let object = self.object(id.clone(), &file.path, false, file.modified_time);
        self.entries.lock().unwrap().insert(
            id.as_str().to_string(),
            FakeEntry {
                object,
                parent: file.parent.clone(),
                content,
            },
        );
        Ok(id)
    }

    async fn update_file(
        &self,
        id: &RemoteId,
        content: Vec<u8>,
        modified_time: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        self.begin_call()?;
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .get_mut(id.as_str())
            .ok_or_else(|| RemoteError::Rejected {
                status: 404,
                body: format!("File not found: {id}"),
            })?;
        entry.content = content;
        entry.object.modified_time = modified_time;
        Ok(())
    }

    async fn download_file(&self, id: &RemoteId) -> anyhow::Result<Vec<u8>> {
        self.begin_call()?;
        self.entries
            .lock()
            .unwrap()
            .get(id.as_str())
            .map(|e| e.content.clone())
            .ok_or_else(|| {
                RemoteError::Rejected {
                    status: 404,
                    body: format!("File not found: {id}"),
                }
                .into()
            })
    }

    async fn batch_delete(&self, ids: &[RemoteId]) -> anyhow::Result<()> {
        self.begin_call()?;
        self.batch_delete_calls.fetch_add(1, Ordering::SeqCst);
        let paths: Vec<String> = {
            let entries = self.entries.lock().unwrap();
            ids.iter()
                .filter_map(|id| entries.get(id.as_str()))
                .filter_map(|e| e.object.path())
                .map(|p| p.as_str().to_string())
                .collect()
        };
        for path in paths {
            self.remove(&path);
        }
        Ok(())
    }
}

// ============================================================================
// State store and notifier
// ============================================================================

#[derive(Default)]
pub struct MemoryStateStore {
    pub saved: Mutex<Option<SyncState>>,
    pub saves: AtomicUsize,
}

#[async_trait::async_trait]
impl IStateStore for MemoryStateStore {
    async fn load(&self) -> anyhow::Result<SyncState> {
        Ok(self.saved.lock().unwrap().clone().unwrap_or_default())
    }

    async fn save(&self, state: &SyncState) -> anyhow::Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.saved.lock().unwrap() = Some(state.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub notifications: Mutex<Vec<Notification>>,
    pub progress: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn bodies(&self) -> Vec<String> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.body.clone())
            .collect()
    }

    pub fn last(&self) -> Option<Notification> {
        self.notifications.lock().unwrap().last().cloned()
    }
}

#[async_trait::async_trait]
impl INotificationService for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        self.notifications.lock().unwrap().push(notification.clone());
        Ok(())
    }

    async fn show_progress(&self, _id: &str, title: &str, _percent: f64) -> anyhow::Result<()> {
        self.progress.lock().unwrap().push(title.to_string());
        Ok(())
    }

    async fn clear_progress(&self, _id: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Accepts only the listed paths
pub struct AcceptPaths(pub Vec<&'static str>);

#[async_trait::async_trait]
impl IPushConfirmer for AcceptPaths {
    async fn confirm(&self, operations: &[Operation]) -> anyhow::Result<Option<Vec<Operation>>> {
        Ok(Some(
            operations
                .iter()
                .filter(|op| self.0.contains(&op.path.as_str()))
                .cloned()
                .collect(),
        ))
    }
}

pub struct Cancel;

#[async_trait::async_trait]
impl IPushConfirmer for Cancel {
    async fn confirm(&self, _operations: &[Operation]) -> anyhow::Result<Option<Vec<Operation>>> {
        Ok(None)
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub dir: Arc<TempDir>,
    pub remote: Arc<FakeRemote>,
    pub store: Arc<MemoryStateStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub engine: SyncEngine,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_state(SyncState::new())
    }

    /// Starts from `state` as if an earlier run had saved it
    pub fn with_state(state: SyncState) -> Self {
        let store = Arc::new(MemoryStateStore::default());
        *store.saved.lock().unwrap() = Some(state);
        Self::build(
            Arc::new(TempDir::new().unwrap()),
            FakeRemote::new(),
            store,
            SyncSettings::default(),
        )
    }

    pub fn with_batch_size(batch_size: usize) -> Self {
        Self::build(
            Arc::new(TempDir::new().unwrap()),
            FakeRemote::new(),
            Arc::new(MemoryStateStore::default()),
            SyncSettings {
                batch_size,
                ..SyncSettings::default()
            },
        )
    }

    /// Another device with its own tree and state, syncing against `remote`
    pub fn replica_of(remote: &Arc<FakeRemote>) -> Self {
        Self::build(
            Arc::new(TempDir::new().unwrap()),
            Arc::clone(remote),
            Arc::new(MemoryStateStore::default()),
            SyncSettings::default(),
        )
    }

    /// Another process over the same tree, state document and remote store
    pub fn beside(&self) -> Self {
        Self::build(
            Arc::clone(&self.dir),
            Arc::clone(&self.remote),
            Arc::clone(&self.store),
            self.ctx().settings().clone(),
        )
    }

    fn build(
        dir: Arc<TempDir>,
        remote: Arc<FakeRemote>,
        store: Arc<MemoryStateStore>,
        settings: SyncSettings,
    ) -> Self {
        let notifier = Arc::new(RecordingNotifier::default());
        let state = store.saved.lock().unwrap().clone().unwrap_or_default();

        let ctx = SyncContext::new(
            Arc::clone(&remote) as Arc<dyn IRemoteStore>,
            Arc::new(LocalTreeAdapter::new(dir.path())),
            Arc::clone(&store) as Arc<dyn IStateStore>,
            Arc::clone(&notifier) as Arc<dyn INotificationService>,
            settings,
            state,
        );

        Self {
            dir,
            remote,
            store,
            notifier,
            engine: SyncEngine::new(Arc::new(ctx)),
        }
    }

    pub fn ctx(&self) -> &SyncContext {
        self.engine.context()
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, path: &str, content: &str) {
        let full = self.root().join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }

    pub fn mkdir(&self, path: &str) {
        std::fs::create_dir_all(self.root().join(path)).unwrap();
    }

    pub fn read(&self, path: &str) -> Option<String> {
        std::fs::read_to_string(self.root().join(path)).ok()
    }

    pub fn exists(&self, path: &str) -> bool {
        self.root().join(path).exists()
    }

    /// Records an operation the way the watcher would, saved at once
    pub async fn record(&self, path: &str, kind: OperationKind) {
        self.ctx().with_state(|s| s.record(p(path), kind)).await;
        self.ctx().persist().await.unwrap();
    }

    /// The state document as last saved
    pub fn saved(&self) -> SyncState {
        self.store.saved.lock().unwrap().clone().unwrap_or_default()
    }

    pub fn mtime(&self, path: &str) -> DateTime<Utc> {
        let modified = std::fs::metadata(self.root().join(path))
            .unwrap()
            .modified()
            .unwrap();
        DateTime::<Utc>::from(modified)
    }

    pub async fn pending(&self) -> Vec<(String, OperationKind)> {
        let mut ops: Vec<(String, OperationKind)> = self
            .ctx()
            .state()
            .await
            .operations
            .snapshot()
            .into_iter()
            .map(|op| (op.path.as_str().to_string(), op.kind))
            .collect();
        ops.sort_by(|a, b| a.0.cmp(&b.0));
        ops
    }
}
