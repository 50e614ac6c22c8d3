//! Shared test helpers for files API integration tests
//!
//! Provides a wiremock server with the token endpoint mounted, and a
//! DriveRemoteStore pointed at it.

use vaultsync_core::{config::RemoteConfig, domain::Credential};
use vaultsync_drive::DriveRemoteStore;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

pub const VAULT: &str = "Notes";
pub const ACCESS_TOKEN: &str = "access-1";

/// Matches requests whose query parameter `key` contains `needle`
pub struct ParamContains(pub &'static str, pub &'static str);

impl Match for ParamContains {
    fn matches(&self, request: &Request) -> bool {
        request
            .url
            .query_pairs()
            .any(|(k, v)| k == self.0 && v.contains(self.1))
    }
}

/// Matches requests that do not carry query parameter `key`
pub struct ParamMissing(pub &'static str);

impl Match for ParamMissing {
    fn matches(&self, request: &Request) -> bool {
        !request.url.query_pairs().any(|(k, _)| k == self.0)
    }
}

pub fn config(server: &MockServer) -> RemoteConfig {
    RemoteConfig {
        api_base_url: server.uri(),
        token_url: format!("{}/token", server.uri()),
        ping_url: format!("{}/generate_204", server.uri()),
        vault_name: VAULT.to_string(),
    }
}

/// Starts a mock server with a working token endpoint
pub async fn setup() -> (MockServer, DriveRemoteStore) {
    let server = MockServer::start().await;
    mount_token(&server).await;
    let store = store_for(&server);
    (server, store)
}

pub fn store_for(server: &MockServer) -> DriveRemoteStore {
    let credential = Credential::new("refresh-1").unwrap();
    DriveRemoteStore::from_config(&config(server), Some(credential)).unwrap()
}

pub async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_partial_json(serde_json::json!({"refresh_token": "refresh-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": ACCESS_TOKEN,
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .mount(server)
        .await;
}

/// JSON for one listed object
pub fn object(id: &str, path: &str, mime: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": path.rsplit('/').next().unwrap_or(path),
        "mimeType": mime,
        "starred": false,
        "properties": {"path": path, "vault": VAULT},
        "modifiedTime": "2024-05-01T12:00:00.000Z"
    })
}

/// Mounts the vault root lookup, answering with folder `root_id`
pub async fn mount_root(server: &MockServer, root_id: &str) {
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(ParamContains("q", "key='vaultRoot'"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [{
                "id": root_id,
                "name": VAULT,
                "mimeType": "application/vnd.google-apps.folder",
                "properties": {"vaultRoot": "true", "vault": VAULT},
                "modifiedTime": "2024-01-01T00:00:00.000Z"
            }]
        })))
        .mount(server)
        .await;
}
