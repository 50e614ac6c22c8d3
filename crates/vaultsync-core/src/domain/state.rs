//! The persisted sync state aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::IdentityIndex;
use super::newtypes::{ChangeCursor, Credential, VaultPath};
use super::operation::{OperationKind, OperationLog};

/// Everything that survives between runs, stored as one document
///
/// A fresh state has `last_synced_at` at the Unix epoch, so the first pull
/// fetches every remote object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    #[serde(default)]
    pub operations: OperationLog,
    #[serde(default)]
    pub identity_index: IdentityIndex,
    #[serde(default)]
    pub last_synced_at: DateTime<Utc>,
    #[serde(default)]
    pub change_cursor: Option<ChangeCursor>,
    #[serde(default)]
    pub credential: Option<Credential>,
}

impl SyncState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a local event, consulting the identity index for remote presence
    pub fn record(&mut self, path: VaultPath, kind: OperationKind) -> Option<OperationKind> {
        let known = self.identity_index.contains_path(&path);
        self.operations.record(path, kind, known)
    }

    /// Records a rename as Delete(from) + Create(to)
    pub fn record_rename(&mut self, from: VaultPath, to: VaultPath) {
        let from_known = self.identity_index.contains_path(&from);
        let to_known = self.identity_index.contains_path(&to);
        self.operations.record_rename(from, to, from_known, to_known);
    }

    /// Marks a run as complete at `at`, optionally moving the change cursor
    pub fn advance(&mut self, at: DateTime<Utc>, cursor: Option<ChangeCursor>) {
        self.last_synced_at = at;
        if let Some(cursor) = cursor {
            self.change_cursor = Some(cursor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RemoteId;

    fn p(s: &str) -> VaultPath {
        VaultPath::new(s).unwrap()
    }

    #[test]
    fn test_default_state_starts_at_epoch() {
        let state = SyncState::new();
        assert_eq!(state.last_synced_at.timestamp(), 0);
        assert!(state.operations.is_empty());
        assert!(state.change_cursor.is_none());
        assert!(state.credential.is_none());
    }

    #[test]
    fn test_record_uses_identity_index() {
        let mut state = SyncState::new();
        state
            .identity_index
            .insert(RemoteId::new("f1").unwrap(), p("known.md"));

        state.record(p("known.md"), OperationKind::Delete);
        state.record(p("known.md"), OperationKind::Create);
        assert_eq!(state.operations.get(&p("known.md")), Some(OperationKind::Modify));

        state.record(p("fresh.md"), OperationKind::Delete);
        state.record(p("fresh.md"), OperationKind::Create);
        assert_eq!(state.operations.get(&p("fresh.md")), Some(OperationKind::Create));
    }

    #[test]
    fn test_advance_keeps_cursor_when_none() {
        let mut state = SyncState::new();
        state.change_cursor = Some(ChangeCursor::new("10").unwrap());
        let now = Utc::now();

        state.advance(now, None);
        assert_eq!(state.last_synced_at, now);
        assert_eq!(state.change_cursor.as_ref().unwrap().as_str(), "10");

        state.advance(now, Some(ChangeCursor::new("11").unwrap()));
        assert_eq!(state.change_cursor.as_ref().unwrap().as_str(), "11");
    }

    #[test]
    fn test_document_shape() {
        let mut state = SyncState::new();
        state.record(p("a.md"), OperationKind::Create);
        state
            .identity_index
            .insert(RemoteId::new("f1").unwrap(), p("b.md"));
        state.credential = Some(Credential::new("refresh").unwrap());

        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["operations"]["a.md"], "create");
        assert_eq!(value["identityIndex"]["f1"], "b.md");
        assert_eq!(value["credential"], "refresh");
        assert!(value["changeCursor"].is_null());

        let parsed: SyncState = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, state);
    }

    #[test]
    fn test_missing_fields_default() {
        let parsed: SyncState = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, SyncState::default());
    }
}
