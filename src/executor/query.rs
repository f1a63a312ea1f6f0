use super::ExecutionContext;
use crate::core::{Result, Row};
use crate::parser::ast::{Projection, SelectStmt};
use crate::result::QueryResult;

pub async fn execute_select(ctx: &mut ExecutionContext<'_>, stmt: &SelectStmt) -> Result<QueryResult> {
    let schema = ctx.schema(&stmt.table_name)?;

    let rows: Vec<Row> = match &stmt.filter {
        Some(filter) => {
            let keys = ctx.candidate_keys(&schema, filter)?;
            let mut rows = Vec::with_capacity(keys.len());
            for key in keys {
                if stmt.for_update {
                    ctx.lock_row(schema.name(), &key).await?;
                }
                if let Some(row) = ctx.visible_row(schema.name(), &key)? {
                    if ctx.matches(&schema, filter, &row)? {
                        rows.push(row);
                    }
                }
            }
            rows
        }
        None => {
            let keys: Vec<_> = ctx.visible_rows(schema.name())?.into_keys().collect();
            let mut rows = Vec::with_capacity(keys.len());
            for key in keys {
                if stmt.for_update {
                    ctx.lock_row(schema.name(), &key).await?;
                }
                if let Some(row) = ctx.visible_row(schema.name(), &key)? {
                    rows.push(row);
                }
            }
            rows
        }
    };

    match &stmt.projection {
        Projection::All => Ok(QueryResult::new(schema.column_names(), rows)),
        Projection::Columns(columns) => {
            let indices = columns
                .iter()
                .map(|c| schema.column_index(c))
                .collect::<Result<Vec<_>>>()?;
            let projected = rows
                .into_iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect();
            Ok(QueryResult::new(columns.clone(), projected))
        }
    }
}
