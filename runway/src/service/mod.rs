//! Use cases of the engine.
//!
//! [MigrationService] mutates the history under the advisory lock.
//! [StatusService] and [ValidationService] only read it.

mod migration_service;
mod outcome;
mod status_service;
mod validation_service;

pub use migration_service::*;
pub use outcome::*;
pub use status_service::*;
pub use validation_service::*;
