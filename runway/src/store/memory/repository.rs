use crate::common::MIGRATIONS_COLLECTION;
use crate::errors::{ErrorKind, RunwayError, RunwayResult};
use crate::store::memory::MemoryStore;
use crate::store::{DocumentStore, MigrationRecord, MigrationRepositoryProvider};
use crate::transaction::StoreTransaction;

/// Migration repository kept in the `__runway_migrations` collection of a
/// [MemoryStore].
///
/// Each record is stored under its version as document id. Writes go
/// through the scope handed in by the engine, so a record change commits or
/// rolls back with the migration; reads see the committed store.
pub struct MemoryMigrationRepository {
    store: MemoryStore,
}

impl MemoryMigrationRepository {
    pub fn new(store: MemoryStore) -> Self {
        store.ensure_collection(MIGRATIONS_COLLECTION);
        MemoryMigrationRepository { store }
    }
}

impl MigrationRepositoryProvider for MemoryMigrationRepository {
    fn all_records(&self) -> RunwayResult<Vec<MigrationRecord>> {
        self.store
            .find_all(MIGRATIONS_COLLECTION)?
            .iter()
            .map(|(_, doc)| MigrationRecord::from_document(doc))
            .collect()
    }

    fn record(&self, version: u64) -> RunwayResult<Option<MigrationRecord>> {
        self.store
            .get(MIGRATIONS_COLLECTION, version)?
            .map(|doc| MigrationRecord::from_document(&doc))
            .transpose()
    }

    fn mark_applied(&self, scope: &StoreTransaction, record: &MigrationRecord) -> RunwayResult<()> {
        scope.put(MIGRATIONS_COLLECTION, record.version, record.to_document()?)?;
        Ok(())
    }

    fn mark_unapplied(&self, scope: &StoreTransaction, version: u64) -> RunwayResult<()> {
        let doc = scope.get(MIGRATIONS_COLLECTION, version)?.ok_or_else(|| {
            RunwayError::new(
                &format!("No record for migration version {}", version),
                ErrorKind::NotFound,
            )
        })?;

        let mut record = MigrationRecord::from_document(&doc)?;
        record.is_applied = false;
        record.applied_at = None;
        record.applied_by = None;
        scope.put(MIGRATIONS_COLLECTION, version, record.to_document()?)?;
        Ok(())
    }
}
