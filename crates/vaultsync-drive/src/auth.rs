//! Access token management
//!
//! The state document stores a long-lived refresh credential. Every request
//! needs a short-lived access token, which [`TokenProvider`] obtains from the
//! configured token endpoint and caches until it is about to expire.
//!
//! ## Refresh Flow
//!
//! 1. **Cached**: a token with more than [`REFRESH_MARGIN_SECS`] left is reused
//! 2. **Refresh**: `POST {token_url}` with `{"refresh_token": ...}` returns
//!    `{"access_token", "expires_in"}`
//! 3. **Failure**: any failure is reported as [`DriveError::AuthRefresh`],
//!    which the engines treat as a rejected credential

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use vaultsync_core::domain::Credential;

use crate::{DriveError, DriveResult};

/// A token closer than this many seconds to expiry is refreshed before use
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Body sent to the token endpoint
#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Response from the token endpoint
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    /// Lifetime in seconds
    expires_in: i64,
}

/// A short-lived bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// Returns true if the token must be refreshed before use at `now`
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now < Duration::seconds(REFRESH_MARGIN_SECS)
    }
}

/// Exchanges the refresh credential for access tokens and caches them
pub struct TokenProvider {
    http: Client,
    token_url: String,
    credential: Option<Credential>,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenProvider {
    /// Creates a provider; `credential` is `None` when the user has not
    /// signed in yet, in which case every request fails as unauthorized
    pub fn new(http: Client, token_url: impl Into<String>, credential: Option<Credential>) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            credential,
            cached: Mutex::new(None),
        }
    }

    /// Returns a usable access token, refreshing it if needed
    ///
    /// # Errors
    /// Returns [`DriveError::AuthRefresh`] if there is no credential or the
    /// token endpoint rejects it
    pub async fn access_token(&self) -> DriveResult<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if !token.needs_refresh(Utc::now()) {
                return Ok(token.token.clone());
            }
            debug!(expires_at = %token.expires_at, "Access token about to expire");
        }

        let token = self.refresh().await?;
        let value = token.token.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Drops the cached token so the next request refreshes it
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    async fn refresh(&self) -> DriveResult<AccessToken> {
        let credential = self
            .credential
            .as_ref()
            .ok_or_else(|| DriveError::AuthRefresh("no credential stored".to_string()))?;

        info!("Refreshing access token");
        let response = self
            .http
            .post(&self.token_url)
            .json(&RefreshRequest {
                refresh_token: credential.expose(),
            })
            .send()
            .await
            .map_err(|e| DriveError::AuthRefresh(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Token endpoint rejected the credential");
            return Err(DriveError::AuthRefresh(format!("HTTP {status}: {body}")));
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| DriveError::AuthRefresh(format!("malformed token response: {e}")))?;

        Ok(AccessToken::new(
            body.access_token,
            Utc::now() + Duration::seconds(body.expires_in),
        ))
    }
}
