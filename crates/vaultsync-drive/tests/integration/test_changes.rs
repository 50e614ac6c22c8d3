//! Change feed tests

use vaultsync_core::{domain::ChangeCursor, ports::IRemoteStore};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_start_cursor() {
    let (server, store) = common::setup().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/changes/startPageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "kind": "drive#startPageToken",
            "startPageToken": "100"
        })))
        .mount(&server)
        .await;

    let cursor = store.change_start_cursor().await.unwrap();
    assert_eq!(cursor.as_str(), "100");
}

#[tokio::test]
async fn test_changes_follow_pages_and_return_new_cursor() {
    let (server, store) = common::setup().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/changes"))
        .and(query_param("pageToken", "100"))
        .and(query_param("includeRemoved", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "nextPageToken": "101",
            "changes": [
                {"fileId": "a", "removed": true, "time": "2024-05-01T12:00:00.000Z"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/changes"))
        .and(query_param("pageToken", "101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "newStartPageToken": "102",
            "changes": [
                {"fileId": "b", "removed": false, "time": "2024-05-01T12:00:01.000Z"},
                {"fileId": "c", "removed": true, "time": "2024-05-01T12:00:02.000Z"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let feed = store
        .changes_since(&ChangeCursor::new("100").unwrap())
        .await
        .unwrap();

    assert_eq!(feed.changes.len(), 3);
    let removed: Vec<&str> = feed.removed().map(|id| id.as_str()).collect();
    assert_eq!(removed, vec!["a", "c"]);
    assert_eq!(feed.next_cursor, Some(ChangeCursor::new("102").unwrap()));
}
