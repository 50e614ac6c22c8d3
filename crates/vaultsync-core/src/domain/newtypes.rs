//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// VaultPath
// ============================================================================

/// A path inside the synchronized tree, relative to its root
///
/// VaultPath ensures the path is:
/// - Non-empty and relative (no leading `/`)
/// - Made of `/`-separated segments with no empty, `.` or `..` segments
///
/// The same string is used locally (joined onto the local root) and remotely
/// (stored in the `path` property of every remote object).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VaultPath(String);

impl VaultPath {
    /// Create a new VaultPath
    ///
    /// A single leading or trailing `/` is tolerated and stripped.
    ///
    /// # Errors
    /// Returns error if the path is empty or contains invalid segments
    pub fn new(path: impl Into<String>) -> Result<Self, DomainError> {
        let raw: String = path.into();
        let trimmed = raw.trim_start_matches('/').trim_end_matches('/');

        if trimmed.is_empty() {
            return Err(DomainError::InvalidPath(format!(
                "Path cannot be empty: '{raw}'"
            )));
        }

        if trimmed
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(DomainError::InvalidPath(raw));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Build a VaultPath from an absolute local path inside `root`
    ///
    /// # Errors
    /// Returns error if `path` is not inside `root` or is not valid UTF-8
    pub fn from_local(root: &Path, path: &Path) -> Result<Self, DomainError> {
        let relative = path
            .strip_prefix(root)
            .map_err(|_| DomainError::PathNotInRoot(path.display().to_string()))?;

        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    let part = part.to_str().ok_or_else(|| {
                        DomainError::InvalidPath(format!(
                            "Path is not valid UTF-8: {}",
                            path.display()
                        ))
                    })?;
                    segments.push(part);
                }
                _ => return Err(DomainError::InvalidPath(path.display().to_string())),
            }
        }

        Self::new(segments.join("/"))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of segments (`"a"` has depth 1, `"a/b"` depth 2)
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.split('/').count()
    }

    /// The last segment of the path
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// The enclosing folder, or `None` for a top-level entry
    #[must_use]
    pub fn parent(&self) -> Option<VaultPath> {
        self.0
            .rsplit_once('/')
            .map(|(parent, _)| VaultPath(parent.to_string()))
    }

    /// Every ancestor from the top level down, excluding the path itself
    #[must_use]
    pub fn ancestors(&self) -> Vec<VaultPath> {
        let segments: Vec<&str> = self.0.split('/').collect();
        (1..segments.len())
            .map(|n| VaultPath(segments[..n].join("/")))
            .collect()
    }

    /// Returns true if `self` lies strictly below `ancestor`
    #[must_use]
    pub fn is_descendant_of(&self, ancestor: &VaultPath) -> bool {
        self.0.len() > ancestor.0.len()
            && self.0.starts_with(ancestor.as_str())
            && self.0.as_bytes()[ancestor.0.len()] == b'/'
    }

    /// Append a single segment
    ///
    /// # Errors
    /// Returns error if the resulting path is invalid
    pub fn join(&self, segment: &str) -> Result<Self, DomainError> {
        Self::new(format!("{}/{}", self.0, segment))
    }

    /// Resolve this path against the local tree root
    #[must_use]
    pub fn to_local(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |acc, s| acc.join(s))
    }
}

impl Display for VaultPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VaultPath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for VaultPath {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<VaultPath> for String {
    fn from(path: VaultPath) -> Self {
        path.0
    }
}

impl AsRef<str> for VaultPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Remote types
// ============================================================================

/// Remote object identifier assigned by the remote store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemoteId(String);

impl RemoteId {
    /// Create a new RemoteId
    ///
    /// # Errors
    /// Returns error if the ID format is invalid
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id: String = id.into();
        if id.is_empty() {
            return Err(DomainError::InvalidRemoteId(
                "Remote ID cannot be empty".to_string(),
            ));
        }

        // Drive ids are URL-safe base64-ish strings
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(DomainError::InvalidRemoteId(format!(
                "Remote ID contains invalid characters: {id}"
            )));
        }

        Ok(Self(id))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RemoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemoteId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RemoteId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RemoteId> for String {
    fn from(id: RemoteId) -> Self {
        id.0
    }
}

/// Opaque position in the remote change feed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChangeCursor(String);

impl ChangeCursor {
    /// Create a new ChangeCursor
    ///
    /// # Errors
    /// Returns error if the token is empty
    pub fn new(token: impl Into<String>) -> Result<Self, DomainError> {
        let token: String = token.into();
        if token.trim().is_empty() {
            return Err(DomainError::InvalidCursor(
                "Change cursor cannot be empty".to_string(),
            ));
        }
        Ok(Self(token))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ChangeCursor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ChangeCursor {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ChangeCursor> for String {
    fn from(cursor: ChangeCursor) -> Self {
        cursor.0
    }
}

/// Long-lived refresh credential used to obtain access tokens
///
/// The Debug implementation never prints the secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Credential(String);

impl Credential {
    /// Create a new Credential
    ///
    /// # Errors
    /// Returns error if the secret is blank
    pub fn new(secret: impl Into<String>) -> Result<Self, DomainError> {
        let secret: String = secret.into();
        if secret.trim().is_empty() {
            return Err(DomainError::MissingCredential);
        }
        Ok(Self(secret.trim().to_string()))
    }

    /// Get the secret value
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl TryFrom<String> for Credential {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Credential> for String {
    fn from(credential: Credential) -> Self {
        credential.0
    }
}
