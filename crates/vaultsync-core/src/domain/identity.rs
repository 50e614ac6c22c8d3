//! Bidirectional mapping between remote object ids and local paths
//!
//! The remote store has no hierarchical paths of its own, so every engine
//! resolves `path -> id` (to address an object) and `id -> path` (to apply a
//! change-feed event) through this index. Both directions are kept in sync:
//! one id maps to exactly one path and one path to exactly one id.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::newtypes::{RemoteId, VaultPath};

/// Bidirectional `RemoteId <-> VaultPath` index
///
/// Persisted as a plain `{ id: path }` map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<RemoteId, VaultPath>",
    into = "BTreeMap<RemoteId, VaultPath>"
)]
pub struct IdentityIndex {
    by_id: HashMap<RemoteId, VaultPath>,
    by_path: HashMap<VaultPath, RemoteId>,
}

impl IdentityIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `id` to `path`, dropping any previous mapping of either side
    pub fn insert(&mut self, id: RemoteId, path: VaultPath) {
        if let Some(old_path) = self.by_id.remove(&id) {
            self.by_path.remove(&old_path);
        }
        if let Some(old_id) = self.by_path.remove(&path) {
            self.by_id.remove(&old_id);
        }
        self.by_path.insert(path.clone(), id.clone());
        self.by_id.insert(id, path);
    }

    /// Removes the mapping for `id`, returning its path
    pub fn remove_id(&mut self, id: &RemoteId) -> Option<VaultPath> {
        let path = self.by_id.remove(id)?;
        self.by_path.remove(&path);
        Some(path)
    }

    /// Removes the mapping for `path`, returning its id
    pub fn remove_path(&mut self, path: &VaultPath) -> Option<RemoteId> {
        let id = self.by_path.remove(path)?;
        self.by_id.remove(&id);
        Some(id)
    }

    #[must_use]
    pub fn path_of(&self, id: &RemoteId) -> Option<&VaultPath> {
        self.by_id.get(id)
    }

    #[must_use]
    pub fn id_of(&self, path: &VaultPath) -> Option<&RemoteId> {
        self.by_path.get(path)
    }

    #[must_use]
    pub fn contains_path(&self, path: &VaultPath) -> bool {
        self.by_path.contains_key(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RemoteId, &VaultPath)> {
        self.by_id.iter()
    }
}

impl From<BTreeMap<RemoteId, VaultPath>> for IdentityIndex {
    fn from(map: BTreeMap<RemoteId, VaultPath>) -> Self {
        let mut index = Self::new();
        for (id, path) in map {
            index.insert(id, path);
        }
        index
    }
}

impl From<IdentityIndex> for BTreeMap<RemoteId, VaultPath> {
    fn from(index: IdentityIndex) -> Self {
        index.by_id.into_iter().collect()
    }
}
