use super::ExecutionContext;
use crate::core::{Result, Value};
use crate::parser::ast::UpdateStmt;
use crate::result::QueryResult;
use crate::transaction::Change;

pub async fn execute_update(ctx: &mut ExecutionContext<'_>, stmt: &UpdateStmt) -> Result<QueryResult> {
    let schema = ctx.schema(&stmt.table_name)?;

    let assignments = stmt
        .assignments
        .iter()
        .map(|a| -> Result<(usize, Value)> {
            Ok((schema.column_index(&a.column)?, a.value.resolve(ctx.params)?))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut affected = 0u64;
    for key in ctx.candidate_keys(&schema, &stmt.filter)? {
        ctx.lock_row(schema.name(), &key).await?;

        // Re-read under the lock: a concurrent commit may have changed it.
        let Some(old_row) = ctx.visible_row(schema.name(), &key)? else {
            continue;
        };
        if !ctx.matches(&schema, &stmt.filter, &old_row)? {
            continue;
        }

        let mut new_row = old_row.clone();
        for (idx, value) in &assignments {
            new_row[*idx] = value.clone();
        }
        schema.validate_row(&new_row)?;
        ExecutionContext::guard_key_unchanged(&schema, &old_row, &new_row)?;

        ctx.txn.record_change(Change::UpdateRow {
            table: schema.name().to_string(),
            key,
            old_row,
            new_row,
        })?;
        affected += 1;
    }

    Ok(QueryResult::affected(affected))
}
