use crate::common::Document;
use crate::errors::{ErrorKind, RunwayError, RunwayResult};
use crate::store::memory::{MemoryStore, StoreState};
use crate::store::{DocumentId, DocumentStore};
use crate::transaction::{StoreTransactionProvider, TransactionState};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Native snapshot transaction of a [MemoryStore].
///
/// The transaction works on a private copy-on-write snapshot taken when it
/// was opened. Commit writes back every collection it touched (created,
/// dropped, renamed or written to) in one step under the store's write
/// lock, so readers see either none or all of its changes. Collections it
/// did not touch keep whatever was committed in the meantime.
pub struct MemoryTransaction {
    id: String,
    store: MemoryStore,
    working: Mutex<StoreState>,
    touched: Mutex<BTreeSet<String>>,
    state: Mutex<TransactionState>,
}

impl MemoryTransaction {
    pub(crate) fn new(store: MemoryStore) -> Self {
        let id = Uuid::new_v4().to_string();
        log::debug!("Opening memory transaction {}", id);
        MemoryTransaction {
            id,
            working: Mutex::new(store.snapshot()),
            store,
            touched: Mutex::new(BTreeSet::new()),
            state: Mutex::new(TransactionState::Active),
        }
    }

    fn check_active(&self) -> RunwayResult<()> {
        let state = *self.state.lock();
        if state != TransactionState::Active {
            return Err(RunwayError::new(
                &format!("Transaction {} is {}", self.id, state),
                ErrorKind::TransactionError,
            ));
        }
        Ok(())
    }

    fn write<T>(
        &self,
        collections: &[&str],
        apply: impl FnOnce(&mut StoreState) -> RunwayResult<T>,
    ) -> RunwayResult<T> {
        self.check_active()?;
        let result = apply(&mut *self.working.lock())?;
        let mut touched = self.touched.lock();
        for name in collections {
            touched.insert(name.to_string());
        }
        Ok(result)
    }
}

impl DocumentStore for MemoryTransaction {
    fn collection_names(&self) -> RunwayResult<Vec<String>> {
        Ok(self.working.lock().collection_names())
    }

    fn has_collection(&self, name: &str) -> RunwayResult<bool> {
        Ok(self.working.lock().has_collection(name))
    }

    fn create_collection(&self, name: &str) -> RunwayResult<()> {
        self.write(&[name], |state| state.create_collection(name))
    }

    fn drop_collection(&self, name: &str) -> RunwayResult<()> {
        self.write(&[name], |state| state.drop_collection(name))
    }

    fn rename_collection(&self, from: &str, to: &str) -> RunwayResult<()> {
        self.write(&[from, to], |state| state.rename_collection(from, to))
    }

    fn insert(&self, collection: &str, document: Document) -> RunwayResult<DocumentId> {
        self.write(&[collection], |state| state.insert(collection, document))
    }

    fn put(
        &self,
        collection: &str,
        id: DocumentId,
        document: Document,
    ) -> RunwayResult<Option<Document>> {
        self.write(&[collection], |state| state.put(collection, id, document))
    }

    fn remove(&self, collection: &str, id: DocumentId) -> RunwayResult<Option<Document>> {
        self.write(&[collection], |state| state.remove(collection, id))
    }

    fn get(&self, collection: &str, id: DocumentId) -> RunwayResult<Option<Document>> {
        self.working.lock().get(collection, id)
    }

    fn find_all(&self, collection: &str) -> RunwayResult<Vec<(DocumentId, Document)>> {
        self.working.lock().find_all(collection)
    }
}

impl StoreTransactionProvider for MemoryTransaction {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_native(&self) -> bool {
        true
    }

    fn state(&self) -> TransactionState {
        *self.state.lock()
    }

    fn commit(&self) -> RunwayResult<()> {
        let mut state = self.state.lock();
        if *state != TransactionState::Active {
            return Err(RunwayError::new(
                &format!("Cannot commit transaction {} in state {}", self.id, *state),
                ErrorKind::TransactionError,
            ));
        }
        *state = TransactionState::PartiallyCommitted;

        let working = std::mem::take(&mut *self.working.lock());
        let touched = std::mem::take(&mut *self.touched.lock());
        self.store.write_state(|committed| {
            for name in &touched {
                committed.set_collection_entry(name, working.collection_entry(name).cloned());
            }
        });

        *state = TransactionState::Committed;
        log::debug!(
            "Committed memory transaction {} ({} collections)",
            self.id,
            touched.len()
        );
        Ok(())
    }

    fn rollback(&self) -> RunwayResult<()> {
        let mut state = self.state.lock();
        if *state != TransactionState::Active {
            return Err(RunwayError::new(
                &format!("Cannot roll back transaction {} in state {}", self.id, *state),
                ErrorKind::TransactionError,
            ));
        }
        *self.working.lock() = StoreState::default();
        self.touched.lock().clear();
        *state = TransactionState::Aborted;
        log::debug!("Rolled back memory transaction {}", self.id);
        Ok(())
    }
}
