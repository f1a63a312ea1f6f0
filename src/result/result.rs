use crate::core::Row;

#[derive(Debug, Clone)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    /// Rows written by an INSERT, UPDATE or DELETE; zero for queries and DDL.
    pub affected_rows: u64,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            affected_rows: 0,
        }
    }

    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            affected_rows: 0,
        }
    }

    pub fn affected(count: u64) -> Self {
        Self {
            affected_rows: count,
            ..Self::empty()
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}
