//! # Runway - Migration engine for document stores
//!
//! Runway applies and reverts an ordered sequence of versioned migrations
//! against a live document store, records which of them are applied,
//! detects applied migrations whose definition changed afterwards, and
//! emits lifecycle events.
//!
//! ## Key Features
//!
//! - **Ordered history**: applied versions always form a gap-free prefix of the known versions
//! - **Drift detection**: every applied migration carries a SHA-256 checksum of its commands
//! - **Atomic migrations**: commands and status record commit or roll back together
//! - **Business rules**: guards checked before a migration's commands run
//! - **Events**: synchronous, prioritized and isolated lifecycle handlers
//! - **Audit log**: append-only record of every action with its outcome
//! - **Exclusive sessions**: an advisory lock held for the whole batch
//! - **Pluggable storage**: target store, repository, journal and lock are ports
//!
//! ## Quick Start
//!
//! ```rust
//! use runway::doc;
//! use runway::migration::{Migration, MigrationCommand, MigrationProcess};
//! use runway::store::memory::MemoryStore;
//! use runway::Runway;
//!
//! let store = MemoryStore::new();
//! let runway = Runway::builder()
//!     .in_memory(store.clone())
//!     .migration(Migration::new(
//!         1,
//!         "create_users",
//!         "users collection with an admin",
//!         MigrationProcess::new()
//!             .command(MigrationCommand::create_collection("users"))
//!             .command(MigrationCommand::insert_documents("users", vec![doc! { "name": "admin" }])),
//!         MigrationProcess::new().command(MigrationCommand::drop_collection("users")),
//!     ))
//!     .open()
//!     .unwrap();
//!
//! let outcome = runway.upgrade_all().unwrap();
//! assert_eq!(outcome.completed, vec![1]);
//! assert!(runway.validate().unwrap().is_valid());
//! ```
//!
//! ## Module Organization
//!
//! - [`common`] - Document model, advisory locks, cancellation and constants
//! - [`errors`] - Error types and result definitions
//! - [`event`] - Lifecycle events and the event manager
//! - [`migration`] - Migrations, commands, rules, checksums and versioning
//! - [`service`] - Migration, status and validation use cases
//! - [`store`] - Storage ports and the in-memory adapter
//! - [`transaction`] - Atomic scopes and the migration session
//! - [`runway`] - The engine facade
//! - [`runway_builder`] - Engine builder
//! - [`runway_config`] - Engine configuration

pub mod common;
pub mod errors;
pub mod event;
pub mod migration;
pub mod runway;
pub mod runway_builder;
pub mod runway_config;
pub mod service;
pub mod store;
pub mod transaction;

pub use crate::runway::Runway;
pub use crate::runway_builder::RunwayBuilder;
