//! Access token and credential failure tests

use vaultsync_core::ports::{IRemoteStore, ObjectQuery, RemoteError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common;

fn remote_error(err: &anyhow::Error) -> Option<&RemoteError> {
    err.chain().find_map(|e| e.downcast_ref::<RemoteError>())
}

#[tokio::test]
async fn test_access_token_is_cached_across_requests() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "access-1",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"files": []})))
        .expect(2)
        .mount(&server)
        .await;

    let store = common::store_for(&server);
    store.search(&ObjectQuery::default()).await.unwrap();
    store.search(&ObjectQuery::default()).await.unwrap();
}

#[tokio::test]
async fn test_rejected_refresh_is_unauthorized() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant"
        })))
        .mount(&server)
        .await;

    let store = common::store_for(&server);
    let err = store.search(&ObjectQuery::default()).await.unwrap_err();
    assert!(remote_error(&err).is_some_and(RemoteError::is_unauthorized));
}

#[tokio::test]
async fn test_rejected_access_token_is_unauthorized() {
    let (server, store) = common::setup().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid Credentials"))
        .mount(&server)
        .await;

    let err = store.search(&ObjectQuery::default()).await.unwrap_err();
    assert!(remote_error(&err).is_some_and(RemoteError::is_unauthorized));
}

#[tokio::test]
async fn test_server_error_is_rejected_not_unauthorized() {
    let (server, store) = common::setup().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend error"))
        .mount(&server)
        .await;

    let err = store.search(&ObjectQuery::default()).await.unwrap_err();
    assert_eq!(
        remote_error(&err),
        Some(&RemoteError::Rejected {
            status: 503,
            body: "backend error".to_string()
        })
    );
}
