//! Storage ports and the in-memory adapter.
//!
//! The engine never references a concrete store. It talks to:
//!
//! - a [TargetStore], the database migrations change, through the
//!   [DocumentStore] operations and `begin_transaction`,
//! - a [MigrationRepository] holding one [MigrationRecord] per version,
//! - an [AuditLogJournal] holding the append-only [AuditLogEntry] trail.
//!
//! The [memory] module implements all three on one in-memory store, with or
//! without native transactions.

mod document_store;
mod journal;
pub mod memory;
mod records;
mod repository;

pub use document_store::*;
pub use journal::*;
pub use records::*;
pub use repository::*;
