use crate::errors::RunwayResult;
use crate::store::DocumentStore;
use crate::transaction::TransactionState;
use std::ops::Deref;
use std::sync::Arc;

/// An atomic scope opened on a target store.
///
/// # Purpose
/// A scope exposes the same [DocumentStore] operations as the store it was
/// opened on. Everything written through it becomes visible to others on
/// `commit` and is discarded on `rollback`.
///
/// # Contract
/// - `commit` and `rollback` are valid only while the scope is `Active`;
///   calling either afterwards fails with `TransactionError`.
/// - A failed `commit` leaves the scope `Failed` with none of its changes
///   applied, as far as the implementation can guarantee.
/// - `is_native` is `false` for compensating scopes, whose isolation and
///   crash-safety guarantees are weaker.
pub trait StoreTransactionProvider: DocumentStore {
    fn id(&self) -> &str;

    fn is_native(&self) -> bool;

    fn state(&self) -> TransactionState;

    fn commit(&self) -> RunwayResult<()>;

    fn rollback(&self) -> RunwayResult<()>;
}

/// Shared handle to an open atomic scope.
#[derive(Clone)]
pub struct StoreTransaction {
    inner: Arc<dyn StoreTransactionProvider>,
}

impl StoreTransaction {
    pub fn new<T: StoreTransactionProvider + 'static>(inner: T) -> Self {
        StoreTransaction {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for StoreTransaction {
    type Target = Arc<dyn StoreTransactionProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
