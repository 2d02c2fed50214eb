use crate::common::Document;
use crate::errors::RunwayResult;
use crate::transaction::StoreTransaction;
use std::ops::Deref;
use std::sync::Arc;

/// Identifier of a document within its collection.
pub type DocumentId = u64;

/// Document operations of a target store.
///
/// # Purpose
/// The engine and the built-in commands touch the target store only through
/// this trait. It is implemented by stores themselves and by the atomic
/// scopes opened on them, so a command cannot tell whether it runs inside a
/// native transaction or a compensating one.
///
/// # Contract
/// - Collections must be created before documents are written to them;
///   writes to a missing collection fail with `CollectionNotFound`.
/// - `create_collection` fails with `CollectionAlreadyExists` if the name is
///   taken, `rename_collection` if the target name is taken.
/// - `find_all` returns documents in ascending id order.
///
/// # Thread Safety
/// Implementers must be `Send + Sync`.
pub trait DocumentStore: Send + Sync {
    /// Returns the collection names in ascending order.
    fn collection_names(&self) -> RunwayResult<Vec<String>>;

    fn has_collection(&self, name: &str) -> RunwayResult<bool>;

    fn create_collection(&self, name: &str) -> RunwayResult<()>;

    /// Drops a collection together with its documents.
    fn drop_collection(&self, name: &str) -> RunwayResult<()>;

    fn rename_collection(&self, from: &str, to: &str) -> RunwayResult<()>;

    /// Inserts a document and returns the id assigned to it.
    fn insert(&self, collection: &str, document: Document) -> RunwayResult<DocumentId>;

    /// Stores a document under `id` and returns the document it replaced.
    fn put(
        &self,
        collection: &str,
        id: DocumentId,
        document: Document,
    ) -> RunwayResult<Option<Document>>;

    /// Removes the document stored under `id` and returns it.
    fn remove(&self, collection: &str, id: DocumentId) -> RunwayResult<Option<Document>>;

    fn get(&self, collection: &str, id: DocumentId) -> RunwayResult<Option<Document>>;

    fn find_all(&self, collection: &str) -> RunwayResult<Vec<(DocumentId, Document)>>;
}

/// A store migrations are applied to.
///
/// `begin_transaction` opens a native atomic scope. Stores without
/// multi-operation atomicity return `Ok(None)`; the engine then falls back to
/// a [CompensatingTransaction](crate::transaction::CompensatingTransaction).
pub trait TargetStoreProvider: DocumentStore {
    fn begin_transaction(&self) -> RunwayResult<Option<StoreTransaction>>;
}

/// High-level handle to a target store.
///
/// `TargetStore` wraps a [TargetStoreProvider] in an `Arc`; clones are cheap
/// and share the provider. It dereferences to the provider, so every
/// [DocumentStore] operation is available on it directly.
#[derive(Clone)]
pub struct TargetStore {
    inner: Arc<dyn TargetStoreProvider>,
}

impl TargetStore {
    pub fn new<T: TargetStoreProvider + 'static>(inner: T) -> Self {
        TargetStore {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for TargetStore {
    type Target = Arc<dyn TargetStoreProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
