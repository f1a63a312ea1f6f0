use crate::core::{Column, DbError, Result, Row, Schema, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct TableSchema {
    name: String,
    schema: Schema,
    key_index: usize,
}

impl TableSchema {
    /// Every table is keyed; a schema without a primary key column is rejected.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Result<Self> {
        let name = name.into();
        let schema = Schema::new(columns);
        let key_index = schema.primary_key_index().ok_or_else(|| {
            DbError::ConstraintViolation(format!("Table '{}' needs a PRIMARY KEY column", name))
        })?;

        Ok(Self {
            name,
            schema,
            key_index,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn key_index(&self) -> usize {
        self.key_index
    }

    pub fn key_column(&self) -> &str {
        &self.schema.columns()[self.key_index].name
    }

    pub fn column_names(&self) -> Vec<String> {
        self.schema.columns().iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.schema
            .find_column_index(column)
            .ok_or_else(|| DbError::ColumnNotFound(column.to_string(), self.name.clone()))
    }

    pub fn validate_row(&self, row: &Row) -> Result<()> {
        if row.len() != self.schema.column_count() {
            return Err(DbError::ConstraintViolation(format!(
                "Table '{}' expects {} values, got {}",
                self.name,
                self.schema.column_count(),
                row.len()
            )));
        }

        for (column, value) in self.schema.columns().iter().zip(row) {
            column.validate(value)?;
        }

        Ok(())
    }

    pub fn key_of<'a>(&self, row: &'a Row) -> &'a Value {
        &row[self.key_index]
    }
}

/// Committed rows of one table, ordered by key.
#[derive(Debug, Clone)]
pub struct Table {
    schema: TableSchema,
    rows: BTreeMap<Value, Row>,
}

impl Table {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn get(&self, key: &Value) -> Option<&Row> {
        self.rows.get(key)
    }

    pub fn contains(&self, key: &Value) -> bool {
        self.rows.contains_key(key)
    }

    pub fn insert(&mut self, row: Row) -> Result<()> {
        self.schema.validate_row(&row)?;
        let key = self.schema.key_of(&row).clone();

        if self.rows.contains_key(&key) {
            return Err(DbError::DuplicateKey {
                table: self.schema.name().to_string(),
                key: key.to_string(),
            });
        }

        self.rows.insert(key, row);
        Ok(())
    }

    /// Overwrites an existing row. Returns `false` when the key is absent.
    pub fn replace(&mut self, key: &Value, row: Row) -> Result<bool> {
        self.schema.validate_row(&row)?;
        match self.rows.get_mut(key) {
            Some(slot) => {
                *slot = row;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn remove(&mut self, key: &Value) -> Option<Row> {
        self.rows.remove(key)
    }

    /// Writes `row` under `key` without validation, returning what it displaced.
    pub(crate) fn put(&mut self, key: Value, row: Row) -> Option<Row> {
        self.rows.insert(key, row)
    }

    pub fn scan(&self) -> impl Iterator<Item = (&Value, &Row)> {
        self.rows.iter()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}
