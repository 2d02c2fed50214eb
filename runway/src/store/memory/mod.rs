//! In-memory implementation of the storage ports.
//!
//! One [MemoryStore] backs the target store, the migration repository and
//! the audit journal, so an engine can run end to end without a database:
//!
//! ```rust
//! use runway::store::memory::{MemoryAuditLogJournal, MemoryMigrationRepository, MemoryStore};
//!
//! let store = MemoryStore::new();
//! let repository = MemoryMigrationRepository::new(store.clone());
//! let journal = MemoryAuditLogJournal::new(store.clone());
//! ```

mod journal;
mod repository;
mod store;
mod transaction;

pub use journal::*;
pub use repository::*;
pub use store::*;
pub use transaction::*;
