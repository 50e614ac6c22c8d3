//! DriveRemoteStore - IRemoteStore implementation for the files API
//!
//! Wraps the [`DriveClient`] and delegates to the files, upload, batch and
//! changes modules to fulfil the [`IRemoteStore`] port contract.
//!
//! ## Design Notes
//!
//! - Every [`DriveError`] is converted into the core [`RemoteError`] before it
//!   enters the `anyhow` chain, so the engines can tell a rejected credential
//!   apart from other failures without knowing about this crate.
//! - `find_by_paths` keeps the default chunked search of the port.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::debug;

use vaultsync_core::{
    config::RemoteConfig,
    domain::{ChangeCursor, Credential, RemoteId, RemoteObject},
    ports::{ChangeFeed, IRemoteStore, NewObject, ObjectQuery, RemoteError},
};

use crate::client::DriveClient;
use crate::{batch, changes, files, upload, DriveError};

fn remote(err: DriveError) -> anyhow::Error {
    anyhow::Error::new(RemoteError::from(err))
}

/// Remote store backed by the files API
pub struct DriveRemoteStore {
    client: DriveClient,
}

impl DriveRemoteStore {
    /// Creates a new `DriveRemoteStore` wrapping the given [`DriveClient`]
    pub fn new(client: DriveClient) -> Self {
        Self { client }
    }

    /// Builds the client from configuration and the stored credential
    pub fn from_config(config: &RemoteConfig, credential: Option<Credential>) -> Result<Self> {
        let client = DriveClient::new(config, credential).map_err(remote)?;
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &DriveClient {
        &self.client
    }
}

#[async_trait::async_trait]
impl IRemoteStore for DriveRemoteStore {
    async fn check_connection(&self) -> bool {
        self.client.check_connection().await
    }

    async fn search(&self, query: &ObjectQuery) -> Result<Vec<RemoteObject>> {
        debug!(matches = query.matches.len(), "DriveRemoteStore::search");
        files::search(&self.client, query)
            .await
            .map_err(remote)
            .context("Failed to search remote objects")
    }

    async fn change_start_cursor(&self) -> Result<ChangeCursor> {
        changes::start_cursor(&self.client)
            .await
            .map_err(remote)
            .context("Failed to fetch change feed start token")
    }

    async fn changes_since(&self, cursor: &ChangeCursor) -> Result<ChangeFeed> {
        debug!(cursor = %cursor, "DriveRemoteStore::changes_since");
        changes::changes_since(&self.client, cursor)
            .await
            .map_err(remote)
            .context("Failed to fetch change feed")
    }

    async fn create_folder(&self, folder: &NewObject) -> Result<RemoteId> {
        files::create_folder(&self.client, folder)
            .await
            .map_err(remote)
            .with_context(|| format!("Failed to create folder {}", folder.path))
    }

    async fn upload_file(&self, file: &NewObject, content: Vec<u8>) -> Result<RemoteId> {
        upload::upload(&self.client, file, content)
            .await
            .map_err(remote)
            .with_context(|| format!("Failed to upload {}", file.path))
    }

    async fn update_file(
        &self,
        id: &RemoteId,
        content: Vec<u8>,
        modified_time: DateTime<Utc>,
    ) -> Result<()> {
        upload::update(&self.client, id, content, modified_time)
            .await
            .map_err(remote)
            .with_context(|| format!("Failed to update file {id}"))
    }

    async fn download_file(&self, id: &RemoteId) -> Result<Vec<u8>> {
        files::download(&self.client, id)
            .await
            .map_err(remote)
            .with_context(|| format!("Failed to download file {id}"))
    }

    async fn batch_delete(&self, ids: &[RemoteId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        debug!(count = ids.len(), "DriveRemoteStore::batch_delete");
        batch::delete(&self.client, ids)
            .await
            .map_err(remote)
            .context("Failed to delete remote objects")
    }
}
