//! VaultSync Drive - Remote store adapter for the Google Drive files API
//!
//! Provides async client for:
//! - Access-token refresh from the stored refresh credential
//! - Vault-scoped object search with composable queries
//! - The change feed used to discover remote deletions
//! - Multipart uploads and batched deletes
//!
//! ## Modules
//!
//! - [`auth`] - Access token cache and refresh endpoint call
//! - [`client`] - Authenticated HTTP client and response status mapping
//! - [`query`] - Rendering of [`vaultsync_core::ports::ObjectQuery`] into the `q` parameter
//! - [`files`] - Search, root folder discovery, folder creation, download
//! - [`upload`] - Multipart/related upload and update bodies
//! - [`batch`] - Multipart/mixed batch delete
//! - [`changes`] - Change feed start token and paging
//! - [`provider`] - [`vaultsync_core::ports::IRemoteStore`] implementation

pub mod auth;
pub mod batch;
pub mod changes;
pub mod client;
pub mod files;
pub mod provider;
pub mod query;
pub mod upload;

pub use provider::DriveRemoteStore;

use thiserror::Error;
use vaultsync_core::ports::RemoteError;

/// Errors that can occur when talking to the files API
#[derive(Debug, Error)]
pub enum DriveError {
    /// The access token was rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The refresh credential could not be exchanged for an access token
    #[error("Token refresh failed: {0}")]
    AuthRefresh(String),

    /// Any other non-success status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The request did not complete in time
    #[error("Request timed out")]
    Timeout,

    /// A network-level error occurred
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for DriveError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DriveError::Timeout
        } else if err.is_decode() {
            DriveError::InvalidResponse(err.to_string())
        } else {
            DriveError::Network(err)
        }
    }
}

impl From<DriveError> for RemoteError {
    fn from(err: DriveError) -> Self {
        match err {
            DriveError::Unauthorized(msg) | DriveError::AuthRefresh(msg) => {
                RemoteError::Unauthorized(msg)
            }
            DriveError::Http { status, body } => RemoteError::Rejected { status, body },
            DriveError::Timeout => RemoteError::Unreachable("request timed out".to_string()),
            DriveError::Network(e) => RemoteError::Unreachable(e.to_string()),
            DriveError::InvalidResponse(msg) => RemoteError::InvalidResponse(msg),
        }
    }
}

/// Shorthand for results inside this crate
pub type DriveResult<T> = Result<T, DriveError>;
