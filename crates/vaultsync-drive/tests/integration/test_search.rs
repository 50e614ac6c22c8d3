//! Search and pagination tests

use vaultsync_core::{
    domain::VaultPath,
    ports::{IRemoteStore, ObjectQuery, QueryMatch},
};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, object, ParamContains, ParamMissing, ACCESS_TOKEN};

#[tokio::test]
async fn test_search_follows_continuation_pages() {
    let (server, store) = common::setup().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(ParamMissing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "nextPageToken": "page-2",
            "files": [object("a", "a.md", "text/markdown")]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [object("b", "notes/b.md", "text/markdown")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let found = store.search(&ObjectQuery::default()).await.unwrap();

    let ids: Vec<&str> = found.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(found[1].path(), Some(VaultPath::new("notes/b.md").unwrap()));
}

#[tokio::test]
async fn test_search_is_scoped_to_vault_and_authenticated() {
    let (server, store) = common::setup().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(header("authorization", format!("Bearer {ACCESS_TOKEN}").as_str()))
        .and(ParamContains("q", "trashed=false"))
        .and(ParamContains("q", "key='vault' and value='Notes'"))
        .and(ParamContains("q", "key='path' and value='notes/a.md'"))
        .and(query_param("pageSize", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [object("a", "notes/a.md", "text/markdown")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let query = ObjectQuery::single(QueryMatch::new().path(&VaultPath::new("notes/a.md").unwrap()));
    let found = store.search(&query).await.unwrap();
    assert_eq!(found.len(), 1);
}

#[tokio::test]
async fn test_search_leaves_out_vault_root_unless_asked() {
    let (server, store) = common::setup().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [
                {
                    "id": "root",
                    "name": "Notes",
                    "mimeType": "application/vnd.google-apps.folder",
                    "properties": {"vaultRoot": "true", "vault": "Notes"},
                    "modifiedTime": "2024-01-01T00:00:00.000Z"
                },
                object("a", "a.md", "text/markdown")
            ]
        })))
        .mount(&server)
        .await;

    let found = store.search(&ObjectQuery::default()).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id.as_str(), "a");

    let with_root = ObjectQuery {
        include_root: true,
        ..ObjectQuery::default()
    };
    let found = store.search(&with_root).await.unwrap();
    assert_eq!(found.len(), 2);
}

#[tokio::test]
async fn test_find_by_paths_combines_matches() {
    let (server, store) = common::setup().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(ParamContains("q", "value='a.md' }) or (properties has { key='path' and value='b.md' })"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [object("b", "b.md", "text/markdown")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let paths = vec![VaultPath::new("a.md").unwrap(), VaultPath::new("b.md").unwrap()];
    let found = store.find_by_paths(&paths).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id.as_str(), "b");
}
