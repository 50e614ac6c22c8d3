//! Domain entities and business logic
//!
//! This module contains the core domain types for VaultSync:
//! - Newtypes for validated paths, identifiers, cursors and credentials
//! - The per-path operation log with its cancellation rules
//! - The bidirectional identity index between remote ids and paths
//! - Remote object metadata and change-feed entries
//! - The persisted sync state aggregate
//! - Domain-specific error types

pub mod errors;
pub mod identity;
pub mod newtypes;
pub mod operation;
pub mod remote_object;
pub mod state;

// Re-export commonly used types
pub use errors::DomainError;
pub use identity::IdentityIndex;
pub use newtypes::*;
pub use operation::{Operation, OperationKind, OperationLog};
pub use remote_object::{ChangeEntry, RemoteObject, FOLDER_MIME_TYPE};
pub use state::SyncState;
