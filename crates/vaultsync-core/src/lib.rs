//! VaultSync Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `OperationLog`, `IdentityIndex`, `RemoteObject`, `SyncState`
//! - **Port definitions** - Traits for adapters: `IRemoteStore`, `ILocalTree`, `IStateStore`,
//!   `INotificationService`, `IPushConfirmer`
//! - **Configuration** - YAML configuration with validation and a fluent builder
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement, and the
//! reconciliation engines in `vaultsync-sync` drive the domain through them.

pub mod config;
pub mod domain;
pub mod ports;
