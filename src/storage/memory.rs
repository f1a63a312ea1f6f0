use super::{Table, TableSchema};
use crate::core::{DbError, Result, Row, Value};
use crate::transaction::Change;
use std::collections::HashMap;

/// Committed state of every table in one database.
///
/// Callers guard this with the database's storage lock; everything here is
/// plain, synchronous data manipulation.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    tables: HashMap<String, Table>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_table(&mut self, schema: TableSchema) -> Result<()> {
        let name = schema.name().to_string();

        if self.tables.contains_key(&name) {
            return Err(DbError::TableExists(name));
        }

        self.tables.insert(name, Table::new(schema));
        Ok(())
    }

    pub fn drop_table(&mut self, table_name: &str) -> Result<()> {
        if self.tables.remove(table_name).is_none() {
            return Err(DbError::TableNotFound(table_name.to_string()));
        }
        Ok(())
    }

    pub fn get_table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    fn get_table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    pub fn get_schema(&self, name: &str) -> Result<TableSchema> {
        Ok(self.get_table(name)?.schema().clone())
    }

    pub fn get_row(&self, table: &str, key: &Value) -> Result<Option<Row>> {
        Ok(self.get_table(table)?.get(key).cloned())
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn row_count(&self, table_name: &str) -> Result<usize> {
        Ok(self.get_table(table_name)?.row_count())
    }

    /// Applies a committed change set. Either every change lands or none does.
    ///
    /// Only the rows a change displaces are kept for undo; a failure replays
    /// them in reverse order.
    pub fn apply(&mut self, changes: &[Change]) -> Result<()> {
        for change in changes {
            if !self.table_exists(change.table_name()) {
                return Err(DbError::TableNotFound(change.table_name().to_string()));
            }
        }

        let mut undo: Vec<Undo> = Vec::with_capacity(changes.len());
        for change in changes {
            match self.apply_one(change) {
                Ok(step) => undo.push(step),
                Err(err) => {
                    for step in undo.into_iter().rev() {
                        self.revert(step);
                    }
                    return Err(err);
                }
            }
        }

        Ok(())
    }

    fn apply_one(&mut self, change: &Change) -> Result<Undo> {
        let table_name = change.table_name();
        let table = self.get_table_mut(table_name)?;
        match change {
            Change::InsertRow { key, row, .. } => {
                table.insert(row.clone())?;
                Ok(Undo::Remove {
                    table: table_name.to_string(),
                    key: key.clone(),
                })
            }
            Change::UpdateRow { key, new_row, .. } => {
                let previous = table
                    .get(key)
                    .cloned()
                    .ok_or_else(|| DbError::not_found(table_name, key))?;
                table.replace(key, new_row.clone())?;
                Ok(Undo::Restore {
                    table: table_name.to_string(),
                    key: key.clone(),
                    row: previous,
                })
            }
            Change::DeleteRow { key, .. } => {
                let previous = table
                    .remove(key)
                    .ok_or_else(|| DbError::not_found(table_name, key))?;
                Ok(Undo::Restore {
                    table: table_name.to_string(),
                    key: key.clone(),
                    row: previous,
                })
            }
        }
    }

    fn revert(&mut self, step: Undo) {
        match step {
            Undo::Remove { table, key } => {
                if let Some(table) = self.tables.get_mut(&table) {
                    table.remove(&key);
                }
            }
            Undo::Restore { table, key, row } => {
                if let Some(table) = self.tables.get_mut(&table) {
                    table.put(key, row);
                }
            }
        }
    }
}

/// Before-image of one applied change.
#[derive(Debug)]
enum Undo {
    Remove { table: String, key: Value },
    Restore { table: String, key: Value, row: Row },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType};

    fn storage_with_member() -> InMemoryStorage {
        let mut storage = InMemoryStorage::new();
        let schema = TableSchema::new(
            "member",
            vec![
                Column::new("member_id", DataType::Text).primary_key(),
                Column::new("money", DataType::Integer),
            ],
        )
        .unwrap();
        storage.create_table(schema).unwrap();
        storage
    }

    fn insert(id: &str, money: i64) -> Change {
        Change::InsertRow {
            table: "member".into(),
            key: Value::from(id),
            row: vec![Value::from(id), Value::Integer(money)],
        }
    }

    #[test]
    fn test_create_duplicate_table() {
        let mut storage = storage_with_member();
        let schema = storage.get_schema("member").unwrap();
        assert!(matches!(
            storage.create_table(schema),
            Err(DbError::TableExists(_))
        ));
    }

    #[test]
    fn test_apply_is_all_or_nothing() {
        let mut storage = storage_with_member();
        storage.apply(&[insert("A", 10)]).unwrap();

        // Second change collides with the committed row.
        let result = storage.apply(&[insert("B", 5), insert("A", 1)]);
        assert!(result.unwrap_err().is_duplicate_key());

        assert_eq!(storage.row_count("member").unwrap(), 1);
        assert!(storage.get_row("member", &Value::from("B")).unwrap().is_none());
    }

    #[test]
    fn test_failed_apply_restores_updated_and_deleted_rows() {
        let mut storage = storage_with_member();
        storage.apply(&[insert("A", 10), insert("B", 20)]).unwrap();

        let update = Change::UpdateRow {
            table: "member".into(),
            key: Value::from("A"),
            old_row: vec![Value::from("A"), Value::Integer(10)],
            new_row: vec![Value::from("A"), Value::Integer(8)],
        };
        let delete = Change::DeleteRow {
            table: "member".into(),
            key: Value::from("B"),
            old_row: vec![Value::from("B"), Value::Integer(20)],
        };

        // Re-inserting A collides after the update and delete already landed.
        let result = storage.apply(&[update, delete, insert("C", 1), insert("A", 1)]);
        assert!(result.unwrap_err().is_duplicate_key());

        assert_eq!(
            storage.get_row("member", &Value::from("A")).unwrap(),
            Some(vec![Value::from("A"), Value::Integer(10)])
        );
        assert_eq!(
            storage.get_row("member", &Value::from("B")).unwrap(),
            Some(vec![Value::from("B"), Value::Integer(20)])
        );
        assert!(storage.get_row("member", &Value::from("C")).unwrap().is_none());
        assert_eq!(storage.row_count("member").unwrap(), 2);
    }

    #[test]
    fn test_apply_unknown_table() {
        let mut storage = storage_with_member();
        let change = Change::DeleteRow {
            table: "ghost".into(),
            key: Value::from("A"),
            old_row: vec![],
        };
        assert!(matches!(
            storage.apply(&[change]),
            Err(DbError::TableNotFound(_))
        ));
    }
}
