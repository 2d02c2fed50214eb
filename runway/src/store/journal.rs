use crate::errors::RunwayResult;
use crate::store::{AuditLogEntry, HistoryQuery};
use std::ops::Deref;
use std::sync::Arc;

/// Append-only audit trail of migration actions.
///
/// Appends happen after a migration's scope has committed or rolled back
/// and are not part of it. `append` must report every failure; the engine
/// turns a failed append into a journal warning on the outcome. Entries of
/// one version must be returned in the order they were appended.
pub trait AuditLogJournalProvider: Send + Sync {
    fn append(&self, entry: &AuditLogEntry) -> RunwayResult<()>;

    fn history(&self, query: &HistoryQuery) -> RunwayResult<Vec<AuditLogEntry>>;
}

/// Shared handle to an [AuditLogJournalProvider].
#[derive(Clone)]
pub struct AuditLogJournal {
    inner: Arc<dyn AuditLogJournalProvider>,
}

impl AuditLogJournal {
    pub fn new<T: AuditLogJournalProvider + 'static>(inner: T) -> Self {
        AuditLogJournal {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for AuditLogJournal {
    type Target = Arc<dyn AuditLogJournalProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
