use runway::common::{LockRegistry, AUDITLOG_COLLECTION};
use runway::errors::{ErrorKind, RunwayError, RunwayResult};
use runway::store::memory::{MemoryMigrationRepository, MemoryStore};
use runway::store::{AuditLogEntry, AuditLogJournalProvider, DocumentStore, HistoryQuery};
use runway::Runway;
use runway_int_test::test_util::collection_migration;

struct UnreachableJournal;

impl AuditLogJournalProvider for UnreachableJournal {
    fn append(&self, _entry: &AuditLogEntry) -> RunwayResult<()> {
        Err(RunwayError::new("journal is unreachable", ErrorKind::BackendError))
    }

    fn history(&self, _query: &HistoryQuery) -> RunwayResult<Vec<AuditLogEntry>> {
        Ok(Vec::new())
    }
}

#[test]
fn test_journal_failure_is_a_warning() {
    let store = MemoryStore::new();
    let runway = Runway::builder()
        .target_store(store.clone())
        .repository(MemoryMigrationRepository::new(store.clone()))
        .journal(UnreachableJournal)
        .lock_provider(LockRegistry::new())
        .migrations(vec![collection_migration(1), collection_migration(2)])
        .open()
        .unwrap();

    let outcome = runway.upgrade_all().unwrap();
    assert!(outcome.is_success());
    assert_eq!(outcome.completed, vec![1, 2]);
    assert!(outcome.has_warnings());
    assert_eq!(outcome.warnings.len(), 2);
    assert_eq!(outcome.warnings[0].version, 1);
    assert_eq!(outcome.warnings[0].error.kind(), &ErrorKind::JournalWriteError);

    // the migrations stay applied
    assert!(store.has_collection("c2").unwrap());
    assert_eq!(runway.status().unwrap().current_version, Some(2));
}

#[test]
fn test_disabled_auditlog_writes_nothing() {
    let store = MemoryStore::new();
    let runway = Runway::builder()
        .in_memory(store.clone())
        .auditlog(false)
        .lock_provider(LockRegistry::new())
        .migration(collection_migration(1))
        .open()
        .unwrap();

    let outcome = runway.upgrade_all().unwrap();
    assert!(!outcome.has_warnings());
    assert!(store.find_all(AUDITLOG_COLLECTION).unwrap().is_empty());
    assert_eq!(
        runway.history(&HistoryQuery::new()).unwrap_err().kind(),
        &ErrorKind::InvalidOperation
    );
}
