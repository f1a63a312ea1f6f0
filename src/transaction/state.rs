// ============================================================================
// Transaction State Management
// ============================================================================
//
// A transaction moves Active -> Committed | Aborted. While active it buffers
// its writes as `Change`s and remembers which row locks it holds so they can
// be released exactly when the transaction ends.
//
// ============================================================================

use super::Change;
use super::locks::RowKey;
use crate::core::{DbError, Result, Row, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global transaction ID counter
static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Generate a new unique transaction ID
    pub fn new() -> Self {
        TransactionId(NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

/// ```text
/// Active ──commit──> Committed
///   │
///   └──rollback──> Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    Aborted,
}

impl TransactionState {
    pub fn is_active(&self) -> bool {
        matches!(self, TransactionState::Active)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionState::Committed | TransactionState::Aborted
        )
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionState::Active => write!(f, "ACTIVE"),
            TransactionState::Committed => write!(f, "COMMITTED"),
            TransactionState::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// Result of looking a key up in a transaction's own write buffer.
#[derive(Debug, PartialEq)]
pub enum Overlay<'a> {
    /// The transaction has not touched this key.
    Untouched,
    /// The transaction wrote this row.
    Written(&'a Row),
    /// The transaction deleted this row.
    Deleted,
}

/// A unit of work owned by exactly one connection.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    state: TransactionState,
    changes: Vec<Change>,
    held_locks: HashSet<RowKey>,
}

impl Transaction {
    pub fn new(id: TransactionId) -> Self {
        Self {
            id,
            state: TransactionState::Active,
            changes: Vec::new(),
            held_locks: HashSet::new(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn change_count(&self) -> usize {
        self.changes.len()
    }

    /// True when the transaction neither wrote anything nor holds locks.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.held_locks.is_empty()
    }

    pub fn holds_lock(&self, key: &RowKey) -> bool {
        self.held_locks.contains(key)
    }

    pub(crate) fn note_lock(&mut self, key: RowKey) {
        self.held_locks.insert(key);
    }

    pub(crate) fn take_locks(&mut self) -> Vec<RowKey> {
        self.held_locks.drain().collect()
    }

    /// Latest buffered image of `table.key`, newest change wins.
    pub fn overlay(&self, table: &str, key: &Value) -> Overlay<'_> {
        self.changes
            .iter()
            .rev()
            .find(|c| c.table_name() == table && c.key() == key)
            .map(|c| match c.after_image() {
                Some(row) => Overlay::Written(row),
                None => Overlay::Deleted,
            })
            .unwrap_or(Overlay::Untouched)
    }

    /// # Errors
    /// Returns error if transaction is not active
    pub fn record_change(&mut self, change: Change) -> Result<()> {
        if !self.state.is_active() {
            return Err(DbError::InvalidState(format!(
                "Cannot record change: transaction {} is {}",
                self.id, self.state
            )));
        }

        self.changes.push(change);
        Ok(())
    }

    /// Position in the change log, taken before a statement runs.
    pub(crate) fn savepoint(&self) -> usize {
        self.changes.len()
    }

    /// Drops changes recorded after `savepoint`. Row locks stay held.
    pub(crate) fn rollback_to(&mut self, savepoint: usize) {
        self.changes.truncate(savepoint);
    }

    /// Marks the transaction committed and hands back its buffered writes.
    pub(crate) fn commit(&mut self) -> Result<Vec<Change>> {
        if !self.state.is_active() {
            return Err(DbError::InvalidState(format!(
                "Cannot commit: transaction {} is already {}",
                self.id, self.state
            )));
        }

        self.state = TransactionState::Committed;
        Ok(std::mem::take(&mut self.changes))
    }

    pub(crate) fn rollback(&mut self) -> Result<()> {
        if !self.state.is_active() {
            return Err(DbError::InvalidState(format!(
                "Cannot rollback: transaction {} is already {}",
                self.id, self.state
            )));
        }

        self.changes.clear();
        self.state = TransactionState::Aborted;
        Ok(())
    }
}
