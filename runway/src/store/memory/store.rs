use crate::common::Document;
use crate::errors::{ErrorKind, RunwayError, RunwayResult};
use crate::store::memory::MemoryTransaction;
use crate::store::{DocumentId, DocumentStore, TargetStoreProvider};
use crate::transaction::StoreTransaction;
use im::OrdMap;
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Clone, Default)]
pub(crate) struct MemoryCollection {
    documents: OrdMap<DocumentId, Document>,
    last_id: DocumentId,
}

/// Copy-on-write state of a memory store.
///
/// Cloning is O(1); a transaction works on a clone and writes back the
/// collections it touched.
#[derive(Clone, Default)]
pub(crate) struct StoreState {
    collections: OrdMap<String, MemoryCollection>,
}

impl StoreState {
    pub(crate) fn collection_names(&self) -> Vec<String> {
        self.collections.keys().cloned().collect()
    }

    pub(crate) fn has_collection(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    pub(crate) fn collection_entry(&self, name: &str) -> Option<&MemoryCollection> {
        self.collections.get(name)
    }

    pub(crate) fn set_collection_entry(&mut self, name: &str, entry: Option<MemoryCollection>) {
        match entry {
            Some(collection) => {
                self.collections.insert(name.to_string(), collection);
            }
            None => {
                self.collections.remove(name);
            }
        }
    }

    pub(crate) fn create_collection(&mut self, name: &str) -> RunwayResult<()> {
        if name.is_empty() {
            return Err(RunwayError::new(
                "Collection name cannot be empty",
                ErrorKind::ValidationError,
            ));
        }
        if self.has_collection(name) {
            return Err(already_exists(name));
        }
        self.collections
            .insert(name.to_string(), MemoryCollection::default());
        Ok(())
    }

    pub(crate) fn drop_collection(&mut self, name: &str) -> RunwayResult<()> {
        self.collections
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_found(name))
    }

    pub(crate) fn rename_collection(&mut self, from: &str, to: &str) -> RunwayResult<()> {
        if to.is_empty() {
            return Err(RunwayError::new(
                "Collection name cannot be empty",
                ErrorKind::ValidationError,
            ));
        }
        if !self.has_collection(from) {
            return Err(not_found(from));
        }
        if self.has_collection(to) {
            return Err(already_exists(to));
        }
        if let Some(collection) = self.collections.remove(from) {
            self.collections.insert(to.to_string(), collection);
        }
        Ok(())
    }

    pub(crate) fn insert(&mut self, name: &str, document: Document) -> RunwayResult<DocumentId> {
        let collection = self.collection_mut(name)?;
        collection.last_id += 1;
        let id = collection.last_id;
        collection.documents.insert(id, document);
        Ok(id)
    }

    pub(crate) fn put(
        &mut self,
        name: &str,
        id: DocumentId,
        document: Document,
    ) -> RunwayResult<Option<Document>> {
        let collection = self.collection_mut(name)?;
        collection.last_id = collection.last_id.max(id);
        Ok(collection.documents.insert(id, document))
    }

    pub(crate) fn remove(&mut self, name: &str, id: DocumentId) -> RunwayResult<Option<Document>> {
        Ok(self.collection_mut(name)?.documents.remove(&id))
    }

    pub(crate) fn get(&self, name: &str, id: DocumentId) -> RunwayResult<Option<Document>> {
        Ok(self.collection(name)?.documents.get(&id).cloned())
    }

    pub(crate) fn find_all(&self, name: &str) -> RunwayResult<Vec<(DocumentId, Document)>> {
        Ok(self
            .collection(name)?
            .documents
            .iter()
            .map(|(id, doc)| (*id, doc.clone()))
            .collect())
    }

    fn collection(&self, name: &str) -> RunwayResult<&MemoryCollection> {
        self.collections.get(name).ok_or_else(|| not_found(name))
    }

    fn collection_mut(&mut self, name: &str) -> RunwayResult<&mut MemoryCollection> {
        self.collections.get_mut(name).ok_or_else(|| not_found(name))
    }
}

fn not_found(name: &str) -> RunwayError {
    RunwayError::new(
        &format!("Collection '{}' does not exist", name),
        ErrorKind::CollectionNotFound,
    )
}

fn already_exists(name: &str) -> RunwayError {
    RunwayError::new(
        &format!("Collection '{}' already exists", name),
        ErrorKind::CollectionAlreadyExists,
    )
}

/// In-memory document store.
///
/// # Purpose
/// `MemoryStore` implements every storage port of the engine without a
/// database: it is a [TargetStoreProvider] and the backing store of
/// [MemoryMigrationRepository](crate::store::memory::MemoryMigrationRepository)
/// and [MemoryAuditLogJournal](crate::store::memory::MemoryAuditLogJournal).
///
/// # Transactions
/// A store created with [MemoryStore::new] opens native snapshot
/// transactions. One created with [MemoryStore::without_transactions]
/// reports no native atomicity, which makes the engine use a compensating
/// scope instead.
///
/// # Thread Safety
/// Clones share the same state; all access goes through one `RwLock`.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryStoreInner>,
}

struct MemoryStoreInner {
    state: RwLock<StoreState>,
    transactional: bool,
}

impl MemoryStore {
    /// Creates an empty store with native transactions.
    pub fn new() -> Self {
        Self::create(true)
    }

    /// Creates an empty store without native transactions.
    pub fn without_transactions() -> Self {
        Self::create(false)
    }

    fn create(transactional: bool) -> Self {
        MemoryStore {
            inner: Arc::new(MemoryStoreInner {
                state: RwLock::new(StoreState::default()),
                transactional,
            }),
        }
    }

    pub fn is_transactional(&self) -> bool {
        self.inner.transactional
    }

    /// Creates the collection unless it exists.
    pub(crate) fn ensure_collection(&self, name: &str) {
        let mut state = self.inner.state.write();
        if !state.has_collection(name) {
            state
                .collections
                .insert(name.to_string(), MemoryCollection::default());
        }
    }

    pub(crate) fn snapshot(&self) -> StoreState {
        self.inner.state.read().clone()
    }

    /// Runs `apply` with exclusive access to the committed state.
    pub(crate) fn write_state<T>(&self, apply: impl FnOnce(&mut StoreState) -> T) -> T {
        apply(&mut *self.inner.state.write())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryStore {
    fn collection_names(&self) -> RunwayResult<Vec<String>> {
        Ok(self.inner.state.read().collection_names())
    }

    fn has_collection(&self, name: &str) -> RunwayResult<bool> {
        Ok(self.inner.state.read().has_collection(name))
    }

    fn create_collection(&self, name: &str) -> RunwayResult<()> {
        self.inner.state.write().create_collection(name)
    }

    fn drop_collection(&self, name: &str) -> RunwayResult<()> {
        self.inner.state.write().drop_collection(name)
    }

    fn rename_collection(&self, from: &str, to: &str) -> RunwayResult<()> {
        self.inner.state.write().rename_collection(from, to)
    }

    fn insert(&self, collection: &str, document: Document) -> RunwayResult<DocumentId> {
        self.inner.state.write().insert(collection, document)
    }

    fn put(
        &self,
        collection: &str,
        id: DocumentId,
        document: Document,
    ) -> RunwayResult<Option<Document>> {
        self.inner.state.write().put(collection, id, document)
    }

    fn remove(&self, collection: &str, id: DocumentId) -> RunwayResult<Option<Document>> {
        self.inner.state.write().remove(collection, id)
    }

    fn get(&self, collection: &str, id: DocumentId) -> RunwayResult<Option<Document>> {
        self.inner.state.read().get(collection, id)
    }

    fn find_all(&self, collection: &str) -> RunwayResult<Vec<(DocumentId, Document)>> {
        self.inner.state.read().find_all(collection)
    }
}

impl TargetStoreProvider for MemoryStore {
    fn begin_transaction(&self) -> RunwayResult<Option<StoreTransaction>> {
        if !self.inner.transactional {
            return Ok(None);
        }
        Ok(Some(StoreTransaction::new(MemoryTransaction::new(
            self.clone(),
        ))))
    }
}
