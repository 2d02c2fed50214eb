//! Migration definitions and the services that order and fingerprint them.
//!
//! A [Migration] is a versioned pair of [MigrationProcess]es. Each process
//! holds the [MigrationRule]s that must hold and the [Command]s to run.
//! Built-in commands are variants of [MigrationCommand]; a
//! [CommandRegistry] rebuilds them (and any registered extension) from
//! argument documents.
//!
//! [ChecksumService] fingerprints the command definitions so edits to an
//! applied migration are detected as drift. [VersioningService] orders the
//! known migrations and resolves the pending candidates in either direction.

mod checksum;
mod commands;
#[allow(clippy::module_inception)]
mod migration;
mod registry;
mod rules;
mod versioning;

pub use checksum::*;
pub use commands::*;
pub use migration::*;
pub use registry::*;
pub use rules::*;
pub use versioning::*;
