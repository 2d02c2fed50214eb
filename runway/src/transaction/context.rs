use crate::migration::Direction;
use crate::transaction::StoreTransaction;

/// What a command or rule sees while its migration runs.
///
/// The context borrows the migration's open scope; every store access made
/// through [MigrationContext::store] belongs to that scope and commits or
/// rolls back with it.
pub struct MigrationContext<'a> {
    scope: &'a StoreTransaction,
    version: u64,
    direction: Direction,
}

impl<'a> MigrationContext<'a> {
    pub fn new(scope: &'a StoreTransaction, version: u64, direction: Direction) -> Self {
        MigrationContext {
            scope,
            version,
            direction,
        }
    }

    /// Returns the atomic scope of the running migration.
    pub fn store(&self) -> &'a StoreTransaction {
        self.scope
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}
