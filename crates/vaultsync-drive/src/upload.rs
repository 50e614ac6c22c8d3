//! Upload operations for the files API
//!
//! Provides functions for sending file content:
//! - [`upload`] - Creates a new file from metadata and content in one request
//! - [`update`] - Replaces the content and modified time of an existing file
//!
//! Both use the `multipart/related` upload type: the first part is the JSON
//! metadata, the second part is the raw content.

use chrono::{DateTime, Utc};
use reqwest::{header::CONTENT_TYPE, Method};
use serde::Serialize;
use tracing::{debug, info};

use vaultsync_core::{domain::RemoteId, ports::NewObject};

use crate::client::DriveClient;
use crate::files::{self, format_time, ObjectMetadata, FILES_PATH};
use crate::{DriveError, DriveResult};

/// Separator between the metadata and content parts
const BOUNDARY: &str = "vaultsync_upload_boundary";

/// Metadata sent when only the modified time changes
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TimestampMetadata {
    modified_time: String,
}

/// Guesses a content type from the file extension
pub fn mime_type_for(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "md" | "markdown" => "text/markdown",
        "txt" => "text/plain",
        "json" => "application/json",
        "css" => "text/css",
        "js" => "text/javascript",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// Builds a `multipart/related` body from JSON metadata and raw content
pub fn multipart_body(metadata: &[u8], content_type: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(metadata.len() + content.len() + 256);
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn related_content_type() -> String {
    format!("multipart/related; boundary={BOUNDARY}")
}

/// Uploads a new file and returns its id
pub async fn upload(
    client: &DriveClient,
    file: &NewObject,
    content: Vec<u8>,
) -> DriveResult<RemoteId> {
    let parent = files::parent_or_root(client, file.parent.as_ref()).await?;
    let metadata = ObjectMetadata::for_path(client.vault_name(), &file.path, parent)
        .modified(file.modified_time);
    let metadata = serde_json::to_vec(&metadata)
        .map_err(|e| DriveError::InvalidResponse(e.to_string()))?;
    let size = content.len();
    let body = multipart_body(&metadata, mime_type_for(file.name()), &content);

    let path = format!("upload/{FILES_PATH}");
    let request = client
        .request(Method::POST, &path)
        .await?
        .query(&[("uploadType", "multipart"), ("fields", "id")])
        .header(CONTENT_TYPE, related_content_type())
        .body(body);
    let bytes = client.send(request).await?.bytes().await?;
    let id = files::parse_id(&bytes)?;

    info!(path = %file.path, id = %id, size, "Uploaded file");
    Ok(id)
}

/// Replaces the content of `id` and sets its modified time
pub async fn update(
    client: &DriveClient,
    id: &RemoteId,
    content: Vec<u8>,
    modified_time: DateTime<Utc>,
) -> DriveResult<()> {
    let metadata = TimestampMetadata {
        modified_time: format_time(&modified_time),
    };
    let metadata = serde_json::to_vec(&metadata)
        .map_err(|e| DriveError::InvalidResponse(e.to_string()))?;
    let size = content.len();
    let body = multipart_body(&metadata, "application/octet-stream", &content);

    let path = format!("upload/{FILES_PATH}/{id}");
    let request = client
        .request(Method::PATCH, &path)
        .await?
        .query(&[("uploadType", "multipart"), ("fields", "id")])
        .header(CONTENT_TYPE, related_content_type())
        .body(body);
    client.send(request).await?;

    debug!(id = %id, size, "Updated file content");
    Ok(())
}
