//! Batched deletes
//!
//! Deletes are sent as one `multipart/mixed` request to the batch endpoint,
//! with one embedded `DELETE` per object. The batch endpoint accepts at most
//! [`MAX_BATCH_SIZE`] parts, so longer id lists are split across requests.

use reqwest::{header::CONTENT_TYPE, Method};
use tracing::{debug, warn};

use vaultsync_core::domain::RemoteId;

use crate::client::DriveClient;
use crate::files::FILES_PATH;
use crate::{DriveError, DriveResult};

/// Largest number of parts one batch request may carry
pub const MAX_BATCH_SIZE: usize = 100;

const BATCH_PATH: &str = "batch/drive/v3";
const BOUNDARY: &str = "batch_boundary";

/// Builds the `multipart/mixed` body deleting every id in `ids`
pub fn delete_body(ids: &[RemoteId]) -> String {
    let mut body = String::new();
    for (index, id) in ids.iter().enumerate() {
        body.push_str(&format!(
            "--{BOUNDARY}\r\n\
             Content-Type: application/http\r\n\
             Content-ID: <delete-{}>\r\n\r\n\
             DELETE /{FILES_PATH}/{id} HTTP/1.1\r\n\r\n",
            index + 1
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body
}

/// Extracts the status codes of the embedded responses, in order
pub fn part_statuses(response: &str) -> Vec<u16> {
    response
        .lines()
        .filter_map(|line| line.trim().strip_prefix("HTTP/1.1 "))
        .filter_map(|rest| rest.split_whitespace().next()?.parse().ok())
        .collect()
}

/// Returns true if an embedded delete status counts as done
///
/// A 404 means the object is already gone, which is the outcome asked for.
fn is_deleted(status: u16) -> bool {
    (200..300).contains(&status) || status == 404
}

/// Deletes every id in `ids`, recursively for folders
pub async fn delete(client: &DriveClient, ids: &[RemoteId]) -> DriveResult<()> {
    for chunk in ids.chunks(MAX_BATCH_SIZE) {
        delete_chunk(client, chunk).await?;
    }
    Ok(())
}

async fn delete_chunk(client: &DriveClient, ids: &[RemoteId]) -> DriveResult<()> {
    let request = client
        .request(Method::POST, BATCH_PATH)
        .await?
        .header(CONTENT_TYPE, format!("multipart/mixed; boundary={BOUNDARY}"))
        .body(delete_body(ids));
    let text = client.send(request).await?.text().await?;

    let statuses = part_statuses(&text);
    if let Some(status) = statuses.iter().copied().find(|s| !is_deleted(*s)) {
        warn!(status, count = ids.len(), "Batch delete part failed");
        return Err(DriveError::Http {
            status,
            body: text,
        });
    }

    debug!(count = ids.len(), parts = statuses.len(), "Batch delete complete");
    Ok(())
}
