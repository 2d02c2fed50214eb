//! Atomic scopes and the session that runs one migration inside one.
//!
//! A [StoreTransaction] is either a native transaction of the target store
//! or a [CompensatingTransaction] that applies changes directly and undoes
//! them from a journal on rollback. [MigrationSession] opens a scope per
//! migration run and commits the data changes together with the status
//! record.

mod compensating;
mod context;
mod core;
mod session;
mod store_transaction;

pub use compensating::*;
pub use context::*;
pub use core::*;
pub use session::*;
pub use store_transaction::*;
