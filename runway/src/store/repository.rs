use crate::errors::RunwayResult;
use crate::store::MigrationRecord;
use crate::transaction::StoreTransaction;
use std::collections::BTreeSet;
use std::ops::Deref;
use std::sync::Arc;

/// Persistence of migration applied-status records.
///
/// # Purpose
/// The repository owns the applied-status records; the engine changes them
/// only through this trait.
///
/// # Atomic scope participation
/// `mark_applied` and `mark_unapplied` receive the scope the migration's
/// commands ran in. An adapter must write through that scope (or through a
/// transaction joined to it) so the status change commits or rolls back
/// together with the data change. Reads observe committed state.
pub trait MigrationRepositoryProvider: Send + Sync {
    /// Returns every record ever written, applied or not, ascending by version.
    fn all_records(&self) -> RunwayResult<Vec<MigrationRecord>>;

    /// Returns the versions currently marked applied.
    fn applied_versions(&self) -> RunwayResult<BTreeSet<u64>> {
        Ok(self
            .all_records()?
            .into_iter()
            .filter(|r| r.is_applied)
            .map(|r| r.version)
            .collect())
    }

    fn record(&self, version: u64) -> RunwayResult<Option<MigrationRecord>>;

    /// Writes `record` as applied inside `scope`, replacing any earlier record
    /// of the same version.
    fn mark_applied(&self, scope: &StoreTransaction, record: &MigrationRecord) -> RunwayResult<()>;

    /// Clears the applied flag of `version` inside `scope`.
    fn mark_unapplied(&self, scope: &StoreTransaction, version: u64) -> RunwayResult<()>;
}

/// Shared handle to a [MigrationRepositoryProvider].
#[derive(Clone)]
pub struct MigrationRepository {
    inner: Arc<dyn MigrationRepositoryProvider>,
}

impl MigrationRepository {
    pub fn new<T: MigrationRepositoryProvider + 'static>(inner: T) -> Self {
        MigrationRepository {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for MigrationRepository {
    type Target = Arc<dyn MigrationRepositoryProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
