//! Remote store port (driven/secondary port)
//!
//! This module defines the interface for the remote object store. The store
//! is flat: objects reference a parent folder by id and carry their vault
//! path in a property bag, so the engines locate objects through queries and
//! the identity index rather than through native paths.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific;
//!   the sync crate classifies them by downcasting.
//! - Uses `#[async_trait]` for async trait methods.
//! - Every implementation scopes objects to a single vault and hides the
//!   vault root folder from query results unless explicitly asked for.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{ChangeCursor, ChangeEntry, RemoteId, RemoteObject, VaultPath};

// ============================================================================
// Query model
// ============================================================================

/// String comparison used in a query clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringSearch {
    Equals(String),
    Contains(String),
    Not(String),
}

impl From<&str> for StringSearch {
    fn from(s: &str) -> Self {
        StringSearch::Equals(s.to_string())
    }
}

impl From<String> for StringSearch {
    fn from(s: String) -> Self {
        StringSearch::Equals(s)
    }
}

/// Date comparison used in a query clause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateComparison {
    Eq(DateTime<Utc>),
    Gt(DateTime<Utc>),
    Lt(DateTime<Utc>),
}

/// One conjunctive clause of a query
///
/// Every populated field must hold (AND). A query with several matches
/// returns objects satisfying any of them (OR).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryMatch {
    pub id: Option<RemoteId>,
    pub name: Vec<StringSearch>,
    pub mime_type: Vec<StringSearch>,
    pub parent: Option<RemoteId>,
    pub starred: Option<bool>,
    pub full_text: Option<String>,
    pub properties: BTreeMap<String, StringSearch>,
    pub modified_time: Option<DateComparison>,
}

impl QueryMatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn id(mut self, id: RemoteId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<StringSearch>) -> Self {
        self.name.push(name.into());
        self
    }

    #[must_use]
    pub fn mime_type(mut self, mime_type: impl Into<StringSearch>) -> Self {
        self.mime_type.push(mime_type.into());
        self
    }

    #[must_use]
    pub fn parent(mut self, parent: RemoteId) -> Self {
        self.parent = Some(parent);
        self
    }

    #[must_use]
    pub fn starred(mut self, starred: bool) -> Self {
        self.starred = Some(starred);
        self
    }

    #[must_use]
    pub fn full_text(mut self, text: impl Into<String>) -> Self {
        self.full_text = Some(text.into());
        self
    }

    #[must_use]
    pub fn property(mut self, key: impl Into<String>, value: impl Into<StringSearch>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Matches the object stored for `path`
    #[must_use]
    pub fn path(self, path: &VaultPath) -> Self {
        self.property(crate::domain::remote_object::PATH_PROPERTY, path.as_str())
    }

    #[must_use]
    pub fn modified_time(mut self, comparison: DateComparison) -> Self {
        self.modified_time = Some(comparison);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A search over the vault's objects
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectQuery {
    /// Alternatives; an empty list matches every object of the vault
    pub matches: Vec<QueryMatch>,
    /// Include the vault root folder in the results
    pub include_root: bool,
}

impl ObjectQuery {
    #[must_use]
    pub fn any(matches: Vec<QueryMatch>) -> Self {
        Self {
            matches,
            include_root: false,
        }
    }

    #[must_use]
    pub fn single(m: QueryMatch) -> Self {
        Self::any(vec![m])
    }

    /// Objects modified strictly after `since`
    #[must_use]
    pub fn modified_after(since: DateTime<Utc>) -> Self {
        Self::single(QueryMatch::new().modified_time(DateComparison::Gt(since)))
    }
}

// ============================================================================
// DTOs
// ============================================================================

/// Metadata of an object about to be created remotely
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewObject {
    pub path: VaultPath,
    /// Parent folder; `None` places the object directly under the vault root
    pub parent: Option<RemoteId>,
    pub modified_time: DateTime<Utc>,
}

impl NewObject {
    #[must_use]
    pub fn new(path: VaultPath, parent: Option<RemoteId>, modified_time: DateTime<Utc>) -> Self {
        Self {
            path,
            parent,
            modified_time,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.path.file_name()
    }
}

/// Change-feed entries since a cursor, plus the cursor for the next call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeFeed {
    pub changes: Vec<ChangeEntry>,
    pub next_cursor: Option<ChangeCursor>,
}

impl ChangeFeed {
    /// Ids of removed objects, in feed order
    pub fn removed(&self) -> impl Iterator<Item = &RemoteId> {
        self.changes
            .iter()
            .filter(|c| c.removed)
            .map(|c| &c.file_id)
    }
}

// ============================================================================
// RemoteError
// ============================================================================

/// Failure categories adapters attach to their `anyhow` errors
///
/// The engines look for this type in an error's chain to tell an expired
/// credential apart from an ordinary failed call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The credential was rejected or could not be refreshed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The remote store could not be reached
    #[error("Remote store unreachable: {0}")]
    Unreachable(String),

    /// The call did not complete within the configured bound
    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),

    /// The remote store answered with a non-success status
    #[error("Remote call rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The response could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, RemoteError::Unauthorized(_))
    }
}

// ============================================================================
// IRemoteStore trait
// ============================================================================

/// Port trait for the remote object store
#[async_trait::async_trait]
pub trait IRemoteStore: Send + Sync {
    /// Returns true if the remote store is reachable
    async fn check_connection(&self) -> bool;

    /// Runs a query, following every continuation page
    async fn search(&self, query: &ObjectQuery) -> anyhow::Result<Vec<RemoteObject>>;

    /// Fetches a cursor positioned at the current end of the change feed
    async fn change_start_cursor(&self) -> anyhow::Result<ChangeCursor>;

    /// Returns every change-feed entry after `cursor`
    async fn changes_since(&self, cursor: &ChangeCursor) -> anyhow::Result<ChangeFeed>;

    /// Creates a folder and returns its id
    async fn create_folder(&self, folder: &NewObject) -> anyhow::Result<RemoteId>;

    /// Uploads a new file (metadata + content) and returns its id
    async fn upload_file(&self, file: &NewObject, content: Vec<u8>) -> anyhow::Result<RemoteId>;

    /// Replaces the content of an existing file
    async fn update_file(
        &self,
        id: &RemoteId,
        content: Vec<u8>,
        modified_time: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    /// Downloads the content of a file
    async fn download_file(&self, id: &RemoteId) -> anyhow::Result<Vec<u8>>;

    /// Deletes several objects in one request; folders are deleted recursively
    async fn batch_delete(&self, ids: &[RemoteId]) -> anyhow::Result<()>;

    /// Looks up the objects stored for `paths`
    ///
    /// Paths with no remote object are simply absent from the result.
    async fn find_by_paths(&self, paths: &[VaultPath]) -> anyhow::Result<Vec<RemoteObject>> {
        let mut found = Vec::new();
        for chunk in paths.chunks(50) {
            let query =
                ObjectQuery::any(chunk.iter().map(|p| QueryMatch::new().path(p)).collect());
            found.extend(self.search(&query).await?);
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_match_builder() {
        let path = VaultPath::new("notes/a.md").unwrap();
        let m = QueryMatch::new().path(&path).starred(true).name("a.md");

        assert_eq!(
            m.properties.get("path"),
            Some(&StringSearch::Equals("notes/a.md".to_string()))
        );
        assert_eq!(m.starred, Some(true));
        assert_eq!(m.name, vec![StringSearch::Equals("a.md".to_string())]);
        assert!(!m.is_empty());
        assert!(QueryMatch::new().is_empty());
    }

    #[test]
    fn test_modified_after_query() {
        let since = Utc::now();
        let query = ObjectQuery::modified_after(since);
        assert_eq!(query.matches.len(), 1);
        assert_eq!(query.matches[0].modified_time, Some(DateComparison::Gt(since)));
        assert!(!query.include_root);
    }

    #[test]
    fn test_change_feed_removed_filter() {
        let time = Utc::now();
        let feed = ChangeFeed {
            changes: vec![
                ChangeEntry {
                    file_id: RemoteId::new("a").unwrap(),
                    removed: true,
                    time,
                },
                ChangeEntry {
                    file_id: RemoteId::new("b").unwrap(),
                    removed: false,
                    time,
                },
            ],
            next_cursor: None,
        };
        let removed: Vec<&str> = feed.removed().map(RemoteId::as_str).collect();
        assert_eq!(removed, vec!["a"]);
    }

    #[test]
    fn test_remote_error_found_through_context() {
        use anyhow::Context;

        let err: anyhow::Result<()> =
            Err(RemoteError::Unauthorized("expired".into())).context("Failed to list files");
        let err = err.unwrap_err();
        let found = err.chain().find_map(|e| e.downcast_ref::<RemoteError>());
        assert!(found.is_some_and(RemoteError::is_unauthorized));
    }

    #[test]
    fn test_new_object_name() {
        let obj = NewObject::new(VaultPath::new("a/b/c.md").unwrap(), None, Utc::now());
        assert_eq!(obj.name(), "c.md");
    }
}
