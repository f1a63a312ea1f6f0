use super::ExecutionContext;
use crate::core::{DbError, Result, Row, Value};
use crate::parser::ast::InsertStmt;
use crate::result::QueryResult;
use crate::transaction::Change;

pub async fn execute_insert(ctx: &mut ExecutionContext<'_>, stmt: &InsertStmt) -> Result<QueryResult> {
    let schema = ctx.schema(&stmt.table_name)?;

    let values = stmt
        .values
        .iter()
        .map(|op| op.resolve(ctx.params))
        .collect::<Result<Vec<_>>>()?;

    let row: Row = match &stmt.columns {
        Some(columns) => {
            if columns.len() != values.len() {
                return Err(DbError::ConstraintViolation(format!(
                    "INSERT lists {} columns but {} values",
                    columns.len(),
                    values.len()
                )));
            }
            let mut row = vec![Value::Null; schema.schema().column_count()];
            for (column, value) in columns.iter().zip(values) {
                row[schema.column_index(column)?] = value;
            }
            row
        }
        None => values,
    };

    schema.validate_row(&row)?;
    let key = schema.key_of(&row).clone();

    ctx.lock_row(schema.name(), &key).await?;

    if ctx.visible_row(schema.name(), &key)?.is_some() {
        return Err(DbError::DuplicateKey {
            table: schema.name().to_string(),
            key: key.to_string(),
        });
    }

    ctx.txn.record_change(Change::InsertRow {
        table: schema.name().to_string(),
        key,
        row,
    })?;

    Ok(QueryResult::affected(1))
}
