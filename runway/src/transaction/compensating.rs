use crate::common::Document;
use crate::errors::{ErrorKind, RunwayError, RunwayResult};
use crate::store::{DocumentId, DocumentStore, TargetStore};
use crate::transaction::{ChangeType, StoreTransactionProvider, TransactionState, UndoEntry};
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

/// Best-effort atomic scope for stores without native transactions.
///
/// # Behaviour
/// Every write goes straight to the underlying store, and an undo entry for
/// it is pushed onto a journal. `rollback` replays the journal in LIFO order;
/// `commit` discards it.
///
/// # Limitations
/// - Not isolated: concurrent readers observe intermediate state before
///   commit or rollback.
/// - Not crash-safe: the undo journal lives in memory, so a crash mid-migration
///   leaves partial effects behind.
/// - An undo step that fails does not stop the remaining steps; rollback then
///   reports `TransactionError` and the store may be left partially reverted.
pub struct CompensatingTransaction {
    id: String,
    store: TargetStore,
    undo_journal: Mutex<Vec<UndoEntry>>,
    state: Mutex<TransactionState>,
}

impl CompensatingTransaction {
    pub fn new(store: TargetStore) -> Self {
        let id = Uuid::new_v4().to_string();
        log::debug!("Opening compensating scope {}", id);
        CompensatingTransaction {
            id,
            store,
            undo_journal: Mutex::new(Vec::new()),
            state: Mutex::new(TransactionState::Active),
        }
    }

    /// Returns the number of undo entries recorded so far.
    pub fn journal_len(&self) -> usize {
        self.undo_journal.lock().len()
    }

    fn check_active(&self) -> RunwayResult<()> {
        let state = *self.state.lock();
        if state != TransactionState::Active {
            return Err(RunwayError::new(
                &format!("Compensating scope {} is {}", self.id, state),
                ErrorKind::TransactionError,
            ));
        }
        Ok(())
    }

    fn record<F>(&self, change_type: ChangeType, collection: &str, undo: F)
    where
        F: Fn(&TargetStore) -> RunwayResult<()> + Send + Sync + 'static,
    {
        let store = self.store.clone();
        self.undo_journal.lock().push(UndoEntry::new(
            change_type,
            collection,
            Arc::new(move || undo(&store)),
        ));
    }

    fn perform_rollback(&self) -> RunwayResult<()> {
        let entries = std::mem::take(&mut *self.undo_journal.lock());
        let mut failures = Vec::new();

        // LIFO order - undo in reverse
        for entry in entries.iter().rev() {
            if let Err(e) = (entry.rollback)() {
                log::error!(
                    "Undo of {:?} on '{}' failed in scope {}: {}",
                    entry.change_type,
                    entry.collection_name,
                    self.id,
                    e
                );
                failures.push(e);
            }
        }

        match failures.into_iter().next() {
            None => Ok(()),
            Some(first) => Err(RunwayError::new_with_cause(
                &format!(
                    "Rollback of compensating scope {} was incomplete",
                    self.id
                ),
                ErrorKind::TransactionError,
                first,
            )),
        }
    }
}

impl DocumentStore for CompensatingTransaction {
    fn collection_names(&self) -> RunwayResult<Vec<String>> {
        self.store.collection_names()
    }

    fn has_collection(&self, name: &str) -> RunwayResult<bool> {
        self.store.has_collection(name)
    }

    fn create_collection(&self, name: &str) -> RunwayResult<()> {
        self.check_active()?;
        self.store.create_collection(name)?;
        let name_owned = name.to_string();
        self.record(ChangeType::CreateCollection, name, move |store| {
            store.drop_collection(&name_owned)
        });
        Ok(())
    }

    fn drop_collection(&self, name: &str) -> RunwayResult<()> {
        self.check_active()?;
        let snapshot = self.store.find_all(name)?;
        self.store.drop_collection(name)?;
        let name_owned = name.to_string();
        self.record(ChangeType::DropCollection, name, move |store| {
            store.create_collection(&name_owned)?;
            for (id, document) in &snapshot {
                store.put(&name_owned, *id, document.clone())?;
            }
            Ok(())
        });
        Ok(())
    }

    fn rename_collection(&self, from: &str, to: &str) -> RunwayResult<()> {
        self.check_active()?;
        self.store.rename_collection(from, to)?;
        let (from_owned, to_owned) = (from.to_string(), to.to_string());
        self.record(ChangeType::RenameCollection, from, move |store| {
            store.rename_collection(&to_owned, &from_owned)
        });
        Ok(())
    }

    fn insert(&self, collection: &str, document: Document) -> RunwayResult<DocumentId> {
        self.check_active()?;
        let id = self.store.insert(collection, document)?;
        let collection_owned = collection.to_string();
        self.record(ChangeType::Insert, collection, move |store| {
            store.remove(&collection_owned, id).map(|_| ())
        });
        Ok(id)
    }

    fn put(
        &self,
        collection: &str,
        id: DocumentId,
        document: Document,
    ) -> RunwayResult<Option<Document>> {
        self.check_active()?;
        let previous = self.store.put(collection, id, document)?;
        let collection_owned = collection.to_string();
        let restore = previous.clone();
        self.record(ChangeType::Update, collection, move |store| match &restore {
            Some(document) => store.put(&collection_owned, id, document.clone()).map(|_| ()),
            None => store.remove(&collection_owned, id).map(|_| ()),
        });
        Ok(previous)
    }

    fn remove(&self, collection: &str, id: DocumentId) -> RunwayResult<Option<Document>> {
        self.check_active()?;
        let previous = self.store.remove(collection, id)?;
        if let Some(document) = previous.clone() {
            let collection_owned = collection.to_string();
            self.record(ChangeType::Remove, collection, move |store| {
                store.put(&collection_owned, id, document.clone()).map(|_| ())
            });
        }
        Ok(previous)
    }

    fn get(&self, collection: &str, id: DocumentId) -> RunwayResult<Option<Document>> {
        self.store.get(collection, id)
    }

    fn find_all(&self, collection: &str) -> RunwayResult<Vec<(DocumentId, Document)>> {
        self.store.find_all(collection)
    }
}

impl StoreTransactionProvider for CompensatingTransaction {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_native(&self) -> bool {
        false
    }

    fn state(&self) -> TransactionState {
        *self.state.lock()
    }

    fn commit(&self) -> RunwayResult<()> {
        let mut state = self.state.lock();
        if *state != TransactionState::Active {
            return Err(RunwayError::new(
                &format!("Cannot commit compensating scope {} in state {}", self.id, *state),
                ErrorKind::TransactionError,
            ));
        }
        self.undo_journal.lock().clear();
        *state = TransactionState::Committed;
        log::debug!("Committed compensating scope {}", self.id);
        Ok(())
    }

    fn rollback(&self) -> RunwayResult<()> {
        let mut state = self.state.lock();
        if *state != TransactionState::Active {
            return Err(RunwayError::new(
                &format!("Cannot roll back compensating scope {} in state {}", self.id, *state),
                ErrorKind::TransactionError,
            ));
        }
        *state = TransactionState::Aborted;
        drop(state);

        log::debug!(
            "Rolling back compensating scope {} ({} undo entries)",
            self.id,
            self.journal_len()
        );
        let result = self.perform_rollback();
        if result.is_err() {
            *self.state.lock() = TransactionState::Failed;
        }
        result
    }
}
