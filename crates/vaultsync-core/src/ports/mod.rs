//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteStore`] - Remote object store (query, change feed, upload, batch delete)
//! - [`ILocalTree`] - Local file tree addressed by [`VaultPath`](crate::domain::VaultPath)
//! - [`IStateStore`] - Persistence of the [`SyncState`](crate::domain::SyncState) document
//! - [`INotificationService`] - User-facing notifications and progress reporting
//! - [`IPushConfirmer`] - Selects which pending operations a push may apply

pub mod confirm;
pub mod local_tree;
pub mod notification;
pub mod remote_store;
pub mod state_store;

pub use confirm::{AcceptAll, IPushConfirmer};
pub use local_tree::{ILocalTree, LocalNode, NodeKind};
pub use notification::{INotificationService, Notification, NotificationPriority};
pub use remote_store::{
    ChangeFeed, DateComparison, IRemoteStore, NewObject, ObjectQuery, QueryMatch, RemoteError,
    StringSearch,
};
pub use state_store::{IStateStore, StateLock};
