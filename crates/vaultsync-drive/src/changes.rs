//! Change feed
//!
//! The feed is addressed by page tokens. A start token marks the current end
//! of the feed; listing from a token returns every change after it, spread
//! over pages linked by `nextPageToken`. The last page carries
//! `newStartPageToken`, which becomes the cursor for the next pull.

use reqwest::Method;
use serde::Deserialize;
use tracing::debug;

use vaultsync_core::{
    domain::{ChangeCursor, ChangeEntry},
    ports::ChangeFeed,
};

use crate::client::DriveClient;
use crate::{DriveError, DriveResult};

const CHANGES_PATH: &str = "drive/v3/changes";
const PAGE_SIZE: &str = "1000";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartPageToken {
    start_page_token: String,
}

/// One page of the change feed
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangeList {
    #[serde(default)]
    changes: Vec<ChangeEntry>,
    next_page_token: Option<String>,
    new_start_page_token: Option<String>,
}

fn cursor(token: String) -> DriveResult<ChangeCursor> {
    ChangeCursor::new(token).map_err(|e| DriveError::InvalidResponse(e.to_string()))
}

/// Fetches a cursor positioned at the current end of the feed
pub async fn start_cursor(client: &DriveClient) -> DriveResult<ChangeCursor> {
    let path = format!("{CHANGES_PATH}/startPageToken");
    let request = client.request(Method::GET, &path).await?;
    let body: StartPageToken = client.send(request).await?.json().await?;

    debug!(token = %body.start_page_token, "Fetched change feed start token");
    cursor(body.start_page_token)
}

async fn list_page(client: &DriveClient, token: &str) -> DriveResult<ChangeList> {
    let request = client.request(Method::GET, CHANGES_PATH).await?.query(&[
        ("pageToken", token),
        ("pageSize", PAGE_SIZE),
        ("includeRemoved", "true"),
    ]);
    let page: ChangeList = client.send(request).await?.json().await?;
    Ok(page)
}

/// Returns every change after `since`, following continuation pages
pub async fn changes_since(client: &DriveClient, since: &ChangeCursor) -> DriveResult<ChangeFeed> {
    let mut page = list_page(client, since.as_str()).await?;
    let mut changes = std::mem::take(&mut page.changes);

    while let Some(token) = page.next_page_token.take() {
        page = list_page(client, &token).await?;
        changes.append(&mut page.changes);
    }

    let next_cursor = page.new_start_page_token.take().map(cursor).transpose()?;
    debug!(
        count = changes.len(),
        removed = changes.iter().filter(|c| c.removed).count(),
        "Fetched change feed"
    );
    Ok(ChangeFeed {
        changes,
        next_cursor,
    })
}
