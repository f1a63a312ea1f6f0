use crate::core::{DbError, Result, Row, Value};
use crate::parser::ast::KeyFilter;
use crate::storage::{InMemoryStorage, TableSchema};
use crate::transaction::{LockManager, Overlay, RowKey, Transaction};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard};
use std::time::Duration;

/// Everything a statement needs: committed storage, the row locks, and the
/// transaction whose buffer it reads through and writes into.
pub struct ExecutionContext<'a> {
    pub storage: &'a RwLock<InMemoryStorage>,
    pub locks: &'a LockManager,
    pub txn: &'a mut Transaction,
    pub params: &'a [Value],
    pub lock_timeout: Duration,
}

impl<'a> ExecutionContext<'a> {
    fn read_storage(&self) -> Result<RwLockReadGuard<'_, InMemoryStorage>> {
        Ok(self.storage.read()?)
    }

    pub fn schema(&self, table: &str) -> Result<TableSchema> {
        self.read_storage()?.get_schema(table)
    }

    /// Waits for the row lock unless this transaction already holds it.
    pub async fn lock_row(&mut self, table: &str, key: &Value) -> Result<()> {
        let row_key = RowKey::new(table, key.clone());
        if self.txn.holds_lock(&row_key) {
            return Ok(());
        }

        self.locks
            .acquire(&row_key, self.txn.id(), self.lock_timeout)
            .await?;
        self.txn.note_lock(row_key);
        Ok(())
    }

    /// The row as this transaction sees it: own writes first, then committed data.
    pub fn visible_row(&self, table: &str, key: &Value) -> Result<Option<Row>> {
        match self.txn.overlay(table, key) {
            Overlay::Written(row) => Ok(Some(row.clone())),
            Overlay::Deleted => Ok(None),
            Overlay::Untouched => self.read_storage()?.get_row(table, key),
        }
    }

    /// Every row this transaction can see, ordered by key.
    pub fn visible_rows(&self, table: &str) -> Result<BTreeMap<Value, Row>> {
        let mut rows: BTreeMap<Value, Row> = {
            let storage = self.read_storage()?;
            storage
                .get_table(table)?
                .scan()
                .map(|(k, r)| (k.clone(), r.clone()))
                .collect()
        };

        for change in self.txn.changes().iter().filter(|c| c.table_name() == table) {
            match change.after_image() {
                Some(row) => {
                    rows.insert(change.key().clone(), row.clone());
                }
                None => {
                    rows.remove(change.key());
                }
            }
        }

        Ok(rows)
    }

    /// Keys whose rows match `column = value`. A filter on the key column
    /// yields that key whether or not the row exists.
    pub fn candidate_keys(&self, schema: &TableSchema, filter: &KeyFilter) -> Result<Vec<Value>> {
        let value = filter.value.resolve(self.params)?;
        let col = schema.column_index(&filter.column)?;

        if col == schema.key_index() {
            return Ok(vec![value]);
        }

        Ok(self
            .visible_rows(schema.name())?
            .into_iter()
            .filter(|(_, row)| row[col] == value)
            .map(|(key, _)| key)
            .collect())
    }

    pub fn matches(&self, schema: &TableSchema, filter: &KeyFilter, row: &Row) -> Result<bool> {
        let value = filter.value.resolve(self.params)?;
        let col = schema.column_index(&filter.column)?;
        Ok(row[col] == value)
    }

    pub fn guard_key_unchanged(schema: &TableSchema, old: &Row, new: &Row) -> Result<()> {
        if schema.key_of(old) != schema.key_of(new) {
            return Err(DbError::UnsupportedOperation(format!(
                "Primary key '{}' of '{}' cannot be updated",
                schema.key_column(),
                schema.name()
            )));
        }
        Ok(())
    }
}
