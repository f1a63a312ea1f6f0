// ============================================================================
// Transaction Management Module
// ============================================================================
//
// Buffered-write transactions with exclusive row locks:
// - State Pattern: transaction lifecycle and connection handle lifecycle
// - Command Pattern: writes recorded as `Change`s, applied on COMMIT
// - Row locks: writers (and FOR UPDATE readers) serialize per key
//
// ============================================================================

pub mod change;
pub mod handle;
pub mod locks;
pub mod state;

pub use change::Change;
pub use handle::{HandleEvent, HandleState};
pub use locks::{LockManager, RowKey};
pub use state::{Overlay, Transaction, TransactionId, TransactionState};
