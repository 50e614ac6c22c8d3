//! Remote object metadata and change-feed entries

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{RemoteId, VaultPath};

/// MIME type the remote store uses for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Property-bag key carrying the local path of an object
pub const PATH_PROPERTY: &str = "path";

/// Property-bag key scoping an object to one vault
pub const VAULT_PROPERTY: &str = "vault";

/// Property-bag key marking the vault root folder
pub const ROOT_PROPERTY: &str = "vaultRoot";

/// Metadata of one object in the remote store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    pub id: RemoteId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub starred: bool,
    #[serde(default)]
    pub properties: HashMap<String, String>,
    pub modified_time: DateTime<Utc>,
}

impl RemoteObject {
    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    /// Returns true for the folder that holds the whole vault
    #[must_use]
    pub fn is_vault_root(&self) -> bool {
        self.properties
            .get(ROOT_PROPERTY)
            .is_some_and(|v| v == "true")
    }

    /// The local path stored in the property bag, if present and valid
    #[must_use]
    pub fn path(&self) -> Option<VaultPath> {
        self.properties
            .get(PATH_PROPERTY)
            .and_then(|p| VaultPath::new(p.as_str()).ok())
    }
}

/// One entry of the remote change feed
///
/// Only `removed` entries are acted upon; additions and modifications are
/// discovered through a modified-time query instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEntry {
    pub file_id: RemoteId,
    #[serde(default)]
    pub removed: bool,
    pub time: DateTime<Utc>,
}
