//! Folder creation, upload, update, download and batch delete tests

use chrono::{TimeZone, Utc};
use vaultsync_core::{
    domain::{RemoteId, VaultPath},
    ports::{IRemoteStore, NewObject, RemoteError},
};
use wiremock::matchers::{
    body_partial_json, body_string_contains, header, method, path, query_param,
};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, mount_root, ParamContains};

fn id(raw: &str) -> RemoteId {
    RemoteId::new(raw).unwrap()
}

fn new_object(path: &str, parent: Option<&str>) -> NewObject {
    NewObject::new(
        VaultPath::new(path).unwrap(),
        parent.map(id),
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    )
}

#[tokio::test]
async fn test_create_top_level_folder_under_vault_root() {
    let (server, store) = common::setup().await;
    mount_root(&server, "root-1").await;

    Mock::given(method("POST"))
        .and(path("/drive/v3/files"))
        .and(body_partial_json(serde_json::json!({
            "name": "notes",
            "mimeType": "application/vnd.google-apps.folder",
            "parents": ["root-1"],
            "properties": {"path": "notes", "vault": "Notes"},
            "modifiedTime": "2024-05-01T12:00:00.000Z"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "f-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let created = store
        .create_folder(&new_object("notes", None))
        .await
        .unwrap();
    assert_eq!(created, id("f-1"));
}

#[tokio::test]
async fn test_vault_root_is_created_once_when_missing() {
    let (server, store) = common::setup().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(ParamContains("q", "key='vaultRoot'"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"files": []})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/drive/v3/files"))
        .and(body_partial_json(serde_json::json!({
            "name": "Notes",
            "properties": {"vaultRoot": "true", "vault": "Notes"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "root-new"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/drive/v3/files"))
        .and(body_partial_json(serde_json::json!({"parents": ["root-new"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "f-2"})))
        .expect(2)
        .mount(&server)
        .await;

    store.create_folder(&new_object("a", None)).await.unwrap();
    store.create_folder(&new_object("b", None)).await.unwrap();
}

#[tokio::test]
async fn test_nested_folder_uses_given_parent() {
    let (server, store) = common::setup().await;

    Mock::given(method("POST"))
        .and(path("/drive/v3/files"))
        .and(body_partial_json(serde_json::json!({
            "parents": ["f-1"],
            "properties": {"path": "notes/daily"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "f-3"})))
        .expect(1)
        .mount(&server)
        .await;

    let created = store
        .create_folder(&new_object("notes/daily", Some("f-1")))
        .await
        .unwrap();
    assert_eq!(created, id("f-3"));
}

#[tokio::test]
async fn test_upload_sends_multipart_related_body() {
    let (server, store) = common::setup().await;

    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .and(query_param("uploadType", "multipart"))
        .and(header(
            "content-type",
            "multipart/related; boundary=vaultsync_upload_boundary",
        ))
        .and(body_string_contains("\"path\":\"notes/a.md\""))
        .and(body_string_contains("\"parents\":[\"f-1\"]"))
        .and(body_string_contains("Content-Type: text/markdown"))
        .and(body_string_contains("# Hello"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "file-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let created = store
        .upload_file(&new_object("notes/a.md", Some("f-1")), b"# Hello".to_vec())
        .await
        .unwrap();
    assert_eq!(created, id("file-1"));
}

#[tokio::test]
async fn test_update_patches_content_and_modified_time() {
    let (server, store) = common::setup().await;

    Mock::given(method("PATCH"))
        .and(path("/upload/drive/v3/files/file-1"))
        .and(query_param("uploadType", "multipart"))
        .and(body_string_contains(
            "\"modifiedTime\":\"2024-05-01T12:00:00.000Z\"",
        ))
        .and(body_string_contains("new content"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "file-1"})))
        .expect(1)
        .mount(&server)
        .await;

    store
        .update_file(
            &id("file-1"),
            b"new content".to_vec(),
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_download_returns_media_bytes() {
    let (server, store) = common::setup().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files/file-1"))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\x00binary\xff".to_vec()))
        .mount(&server)
        .await;

    let content = store.download_file(&id("file-1")).await.unwrap();
    assert_eq!(content, b"\x00binary\xff".to_vec());
}

#[tokio::test]
async fn test_batch_delete_sends_one_request() {
    let (server, store) = common::setup().await;

    Mock::given(method("POST"))
        .and(path("/batch/drive/v3"))
        .and(header("content-type", "multipart/mixed; boundary=batch_boundary"))
        .and(body_string_contains("DELETE /drive/v3/files/a HTTP/1.1"))
        .and(body_string_contains("DELETE /drive/v3/files/b HTTP/1.1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "--batch_x\r\nContent-Type: application/http\r\n\r\nHTTP/1.1 204 No Content\r\n\r\n\
             --batch_x\r\nContent-Type: application/http\r\n\r\nHTTP/1.1 404 Not Found\r\n\r\n\
             --batch_x--\r\n",
        ))
        .expect(1)
        .mount(&server)
        .await;

    store.batch_delete(&[id("a"), id("b")]).await.unwrap();
}

#[tokio::test]
async fn test_batch_delete_reports_failed_part() {
    let (server, store) = common::setup().await;

    Mock::given(method("POST"))
        .and(path("/batch/drive/v3"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "--batch_x\r\nContent-Type: application/http\r\n\r\nHTTP/1.1 403 Forbidden\r\n\r\n\
             --batch_x--\r\n",
        ))
        .mount(&server)
        .await;

    let err = store.batch_delete(&[id("a")]).await.unwrap_err();
    let remote = err.chain().find_map(|e| e.downcast_ref::<RemoteError>());
    assert!(matches!(remote, Some(RemoteError::Rejected { status: 403, .. })));
}

#[tokio::test]
async fn test_check_connection() {
    let (server, store) = common::setup().await;
    assert!(!store.check_connection().await);

    Mock::given(method("GET"))
        .and(path("/generate_204"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    assert!(store.check_connection().await);
}
