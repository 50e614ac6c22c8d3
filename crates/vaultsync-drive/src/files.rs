//! Object listing, folder creation and downloads
//!
//! All objects a vault owns live under one root folder tagged with
//! `vaultRoot=true`. Every object carries a `vault` property naming the
//! vault and a `path` property holding its local path, which is how the
//! engines address remote objects.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use vaultsync_core::{
    domain::{
        remote_object::{PATH_PROPERTY, ROOT_PROPERTY, VAULT_PROPERTY},
        RemoteId, RemoteObject, VaultPath, FOLDER_MIME_TYPE,
    },
    ports::{NewObject, ObjectQuery, QueryMatch},
};

use crate::client::DriveClient;
use crate::query;
use crate::{DriveError, DriveResult};

/// Path of the files collection relative to the API base URL
pub(crate) const FILES_PATH: &str = "drive/v3/files";

/// Largest page the listing endpoint returns
const PAGE_SIZE: u32 = 1000;

/// Fields requested for every listed object
const OBJECT_FIELDS: &str = "id,name,mimeType,starred,description,properties,modifiedTime";

// ============================================================================
// Wire types
// ============================================================================

/// One page of a listing
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<RemoteObject>,
    next_page_token: Option<String>,
}

/// Response carrying only the id of a created object
#[derive(Debug, Deserialize)]
pub(crate) struct IdResponse {
    pub id: RemoteId,
}

/// Metadata body for objects created in the vault
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ObjectMetadata {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<RemoteId>,
    pub properties: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,
}

impl ObjectMetadata {
    /// Metadata for an object stored at `path` under `parent`
    pub fn for_path(vault: &str, path: &VaultPath, parent: RemoteId) -> Self {
        Self {
            name: path.file_name().to_string(),
            mime_type: None,
            description: None,
            parents: vec![parent],
            properties: HashMap::from([
                (VAULT_PROPERTY.to_string(), vault.to_string()),
                (PATH_PROPERTY.to_string(), path.as_str().to_string()),
            ]),
            modified_time: None,
        }
    }

    pub fn modified(mut self, at: DateTime<Utc>) -> Self {
        self.modified_time = Some(format_time(&at));
        self
    }
}

pub(crate) fn format_time(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ============================================================================
// Listing
// ============================================================================

async fn list_page(
    client: &DriveClient,
    q: &str,
    page_token: Option<&str>,
) -> DriveResult<FileList> {
    let fields = format!("nextPageToken,files({OBJECT_FIELDS})");
    let page_size = PAGE_SIZE.to_string();
    let mut params = vec![
        ("q", q),
        ("fields", fields.as_str()),
        ("pageSize", page_size.as_str()),
    ];
    if let Some(token) = page_token {
        params.push(("pageToken", token));
    }

    let request = client.request(Method::GET, FILES_PATH).await?.query(&params);
    let page: FileList = client.send(request).await?.json().await?;
    Ok(page)
}

/// Runs `query` and follows every continuation page
///
/// The vault root folder is left out unless `query.include_root` is set.
pub async fn search(client: &DriveClient, query: &ObjectQuery) -> DriveResult<Vec<RemoteObject>> {
    let q = query::render(query, client.vault_name());
    debug!(q = %q, "Searching files");

    let mut page = list_page(client, &q, None).await?;
    let mut objects = std::mem::take(&mut page.files);
    let mut pages = 1;

    while let Some(token) = page.next_page_token.take() {
        page = list_page(client, &q, Some(&token)).await?;
        objects.append(&mut page.files);
        pages += 1;
    }

    if !query.include_root {
        objects.retain(|o| !o.is_vault_root());
    }
    debug!(count = objects.len(), pages, "Search complete");
    Ok(objects)
}

// ============================================================================
// Root folder
// ============================================================================

/// Returns the id of the vault root folder, creating it on first use
pub async fn root_folder_id(client: &DriveClient) -> DriveResult<RemoteId> {
    client
        .root_cell()
        .get_or_try_init(|| discover_root(client))
        .await
        .cloned()
}

async fn discover_root(client: &DriveClient) -> DriveResult<RemoteId> {
    let query = ObjectQuery {
        matches: vec![QueryMatch::new().property(ROOT_PROPERTY, "true")],
        include_root: true,
    };
    if let Some(root) = search(client, &query).await?.into_iter().next() {
        debug!(id = %root.id, "Found vault root folder");
        return Ok(root.id);
    }

    let vault = client.vault_name();
    let metadata = ObjectMetadata {
        name: vault.to_string(),
        mime_type: Some(FOLDER_MIME_TYPE.to_string()),
        description: Some(format!("Vault: {vault}")),
        parents: Vec::new(),
        properties: HashMap::from([
            (ROOT_PROPERTY.to_string(), "true".to_string()),
            (VAULT_PROPERTY.to_string(), vault.to_string()),
        ]),
        modified_time: None,
    };
    let request = client.request(Method::POST, FILES_PATH).await?.json(&metadata);
    let created: IdResponse = client.send(request).await?.json().await?;

    info!(id = %created.id, vault, "Created vault root folder");
    Ok(created.id)
}

/// The parent for a new object: the given folder, or the vault root
pub(crate) async fn parent_or_root(
    client: &DriveClient,
    parent: Option<&RemoteId>,
) -> DriveResult<RemoteId> {
    match parent {
        Some(id) => Ok(id.clone()),
        None => root_folder_id(client).await,
    }
}

// ============================================================================
// Folders and downloads
// ============================================================================

/// Creates a folder for `folder.path` and returns its id
pub async fn create_folder(client: &DriveClient, folder: &NewObject) -> DriveResult<RemoteId> {
    let parent = parent_or_root(client, folder.parent.as_ref()).await?;
    let mut metadata = ObjectMetadata::for_path(client.vault_name(), &folder.path, parent)
        .modified(folder.modified_time);
    metadata.mime_type = Some(FOLDER_MIME_TYPE.to_string());

    let request = client
        .request(Method::POST, FILES_PATH)
        .await?
        .query(&[("fields", "id")])
        .json(&metadata);
    let created: IdResponse = client.send(request).await?.json().await?;

    debug!(path = %folder.path, id = %created.id, "Created folder");
    Ok(created.id)
}

/// Downloads the content of a file
pub async fn download(client: &DriveClient, id: &RemoteId) -> DriveResult<Vec<u8>> {
    let path = format!("{FILES_PATH}/{id}");
    let request = client
        .request(Method::GET, &path)
        .await?
        .query(&[("alt", "media")]);
    let bytes = client.send(request).await?.bytes().await?;

    debug!(id = %id, bytes = bytes.len(), "Downloaded file");
    Ok(bytes.to_vec())
}

/// Parses an id-only response body
pub(crate) fn parse_id(body: &[u8]) -> DriveResult<RemoteId> {
    serde_json::from_slice::<IdResponse>(body)
        .map(|r| r.id)
        .map_err(|e| DriveError::InvalidResponse(format!("expected an id: {e}")))
}
