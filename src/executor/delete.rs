use super::ExecutionContext;
use crate::core::Result;
use crate::parser::ast::DeleteStmt;
use crate::result::QueryResult;
use crate::transaction::Change;

pub async fn execute_delete(ctx: &mut ExecutionContext<'_>, stmt: &DeleteStmt) -> Result<QueryResult> {
    let schema = ctx.schema(&stmt.table_name)?;

    let mut affected = 0u64;
    for key in ctx.candidate_keys(&schema, &stmt.filter)? {
        ctx.lock_row(schema.name(), &key).await?;

        let Some(old_row) = ctx.visible_row(schema.name(), &key)? else {
            continue;
        };
        if !ctx.matches(&schema, &stmt.filter, &old_row)? {
            continue;
        }

        ctx.txn.record_change(Change::DeleteRow {
            table: schema.name().to_string(),
            key,
            old_row,
        })?;
        affected += 1;
    }

    Ok(QueryResult::affected(affected))
}
