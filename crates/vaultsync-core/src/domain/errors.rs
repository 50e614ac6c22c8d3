//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! mostly validation failures of paths, identifiers and cursors.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid vault path format or content
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Path is not inside the local tree root
    #[error("Path not within local root: {0}")]
    PathNotInRoot(String),

    /// Invalid remote ID format
    #[error("Invalid remote ID: {0}")]
    InvalidRemoteId(String),

    /// Invalid change-feed cursor
    #[error("Invalid change cursor: {0}")]
    InvalidCursor(String),

    /// No credential has been stored yet
    #[error("No credential stored")]
    MissingCredential,

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
