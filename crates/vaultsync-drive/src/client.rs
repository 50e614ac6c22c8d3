//! Files API HTTP client
//!
//! Provides an authenticated HTTP client for the files API. Handles bearer
//! headers, base URL joining and the mapping of non-success statuses into
//! [`DriveError`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vaultsync_core::config::RemoteConfig;
//! use vaultsync_drive::client::DriveClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = DriveClient::new(&RemoteConfig::default(), None)?;
//! println!("online: {}", client.check_connection().await);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use url::Url;

use vaultsync_core::{
    config::RemoteConfig,
    domain::{Credential, RemoteId},
};

use crate::auth::TokenProvider;
use crate::{DriveError, DriveResult};

/// Upper bound for the connectivity probe
const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for files API calls
///
/// Wraps `reqwest::Client` with token handling and base URL construction.
/// Also caches the id of the vault root folder once discovered.
pub struct DriveClient {
    http: Client,
    base_url: Url,
    ping_url: String,
    vault_name: String,
    tokens: TokenProvider,
    root_id: OnceCell<RemoteId>,
}

impl DriveClient {
    /// Creates a client for the endpoints in `config`
    ///
    /// # Errors
    /// Returns [`DriveError::InvalidResponse`] if `api_base_url` is not a URL
    pub fn new(config: &RemoteConfig, credential: Option<Credential>) -> DriveResult<Self> {
        let http = Client::new();
        let mut base = config.api_base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| DriveError::InvalidResponse(format!("bad api_base_url '{base}': {e}")))?;

        Ok(Self {
            tokens: TokenProvider::new(http.clone(), &config.token_url, credential),
            http,
            base_url,
            ping_url: config.ping_url.clone(),
            vault_name: config.vault_name.clone(),
            root_id: OnceCell::new(),
        })
    }

    pub fn vault_name(&self) -> &str {
        &self.vault_name
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn root_cell(&self) -> &OnceCell<RemoteId> {
        &self.root_id
    }

    /// Resolves `path` (e.g. `"drive/v3/files"`) against the base URL
    pub fn url(&self, path: &str) -> DriveResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| DriveError::InvalidResponse(format!("bad request path '{path}': {e}")))
    }

    /// Creates an authenticated request builder for the given method and path
    ///
    /// # Errors
    /// Returns [`DriveError::AuthRefresh`] if no access token can be obtained
    pub async fn request(&self, method: Method, path: &str) -> DriveResult<RequestBuilder> {
        let url = self.url(path)?;
        let token = self.tokens.access_token().await?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    /// Sends a request and turns non-success statuses into errors
    ///
    /// A 401 also drops the cached access token, so the next request
    /// refreshes it.
    pub async fn send(&self, request: RequestBuilder) -> DriveResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), body = %body, "Request failed");
        if status == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
            return Err(DriveError::Unauthorized(body));
        }
        Err(DriveError::Http {
            status: status.as_u16(),
            body,
        })
    }

    /// Probes the configured ping endpoint
    pub async fn check_connection(&self) -> bool {
        match self
            .http
            .get(&self.ping_url)
            .timeout(PING_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(error = %e, "Connectivity check failed");
                false
            }
        }
    }
}
