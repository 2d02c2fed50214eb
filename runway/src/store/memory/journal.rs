use crate::common::AUDITLOG_COLLECTION;
use crate::errors::RunwayResult;
use crate::store::memory::MemoryStore;
use crate::store::{AuditLogEntry, AuditLogJournalProvider, DocumentStore, HistoryQuery};

/// Audit journal kept in the `__runway_auditlog` collection of a
/// [MemoryStore]. Appends are committed immediately.
pub struct MemoryAuditLogJournal {
    store: MemoryStore,
}

impl MemoryAuditLogJournal {
    pub fn new(store: MemoryStore) -> Self {
        store.ensure_collection(AUDITLOG_COLLECTION);
        MemoryAuditLogJournal { store }
    }
}

impl AuditLogJournalProvider for MemoryAuditLogJournal {
    fn append(&self, entry: &AuditLogEntry) -> RunwayResult<()> {
        self.store.insert(AUDITLOG_COLLECTION, entry.to_document()?)?;
        Ok(())
    }

    fn history(&self, query: &HistoryQuery) -> RunwayResult<Vec<AuditLogEntry>> {
        let entries = self
            .store
            .find_all(AUDITLOG_COLLECTION)?
            .iter()
            .map(|(_, doc)| AuditLogEntry::from_document(doc))
            .collect::<RunwayResult<Vec<_>>>()?;
        Ok(query.apply(entries))
    }
}
