// ============================================================================
// Transaction Change Tracking
// ============================================================================
//
// Each Change is buffered in the owning transaction and only reaches shared
// storage on COMMIT. ROLLBACK drops the buffer.
//
// ============================================================================

use crate::core::{Row, Value};

/// A single buffered write.
#[derive(Debug, Clone)]
pub enum Change {
    InsertRow {
        table: String,
        key: Value,
        row: Row,
    },

    UpdateRow {
        table: String,
        key: Value,
        old_row: Row,
        new_row: Row,
    },

    DeleteRow {
        table: String,
        key: Value,
        old_row: Row,
    },
}

impl Change {
    pub fn table_name(&self) -> &str {
        match self {
            Change::InsertRow { table, .. } => table,
            Change::UpdateRow { table, .. } => table,
            Change::DeleteRow { table, .. } => table,
        }
    }

    pub fn key(&self) -> &Value {
        match self {
            Change::InsertRow { key, .. } => key,
            Change::UpdateRow { key, .. } => key,
            Change::DeleteRow { key, .. } => key,
        }
    }

    /// The row as seen after this change; `None` when the change removes it.
    pub fn after_image(&self) -> Option<&Row> {
        match self {
            Change::InsertRow { row, .. } => Some(row),
            Change::UpdateRow { new_row, .. } => Some(new_row),
            Change::DeleteRow { .. } => None,
        }
    }
}
