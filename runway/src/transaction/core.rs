use crate::errors::RunwayResult;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// Lifecycle of an atomic scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    /// Accepting operations
    Active,
    /// Commit started, not yet complete
    PartiallyCommitted,
    /// All changes are durable
    Committed,
    /// Rollback left changes behind
    Failed,
    /// Rolled back
    Aborted,
}

impl Display for TransactionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransactionState::Active => "active",
            TransactionState::PartiallyCommitted => "partially-committed",
            TransactionState::Committed => "committed",
            TransactionState::Failed => "failed",
            TransactionState::Aborted => "aborted",
        };
        write!(f, "{}", name)
    }
}

/// Type of change recorded in an undo journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    CreateCollection,
    DropCollection,
    RenameCollection,
    Insert,
    Update,
    Remove,
}

/// Operation replayed to undo one change.
pub type UndoCommand = Arc<dyn Fn() -> RunwayResult<()> + Send + Sync>;

/// Undo information for one change applied by a compensating scope.
#[derive(Clone)]
pub struct UndoEntry {
    pub change_type: ChangeType,
    pub collection_name: String,
    pub rollback: UndoCommand,
}

impl UndoEntry {
    pub fn new(change_type: ChangeType, collection_name: &str, rollback: UndoCommand) -> Self {
        UndoEntry {
            change_type,
            collection_name: collection_name.to_string(),
            rollback,
        }
    }
}

impl Debug for UndoEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UndoEntry")
            .field("change_type", &self.change_type)
            .field("collection_name", &self.collection_name)
            .finish()
    }
}
