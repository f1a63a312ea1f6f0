pub mod context;
pub mod delete;
pub mod dml;
pub mod query;
pub mod update;

pub use context::ExecutionContext;

use crate::core::{DbError, Result};
use crate::parser::Statement;
use crate::result::QueryResult;

/// Runs a data statement inside `ctx.txn`. DDL never reaches this point.
pub async fn execute(ctx: &mut ExecutionContext<'_>, stmt: &Statement) -> Result<QueryResult> {
    match stmt {
        Statement::Insert(insert) => dml::execute_insert(ctx, insert).await,
        Statement::Select(select) => query::execute_select(ctx, select).await,
        Statement::Update(update) => update::execute_update(ctx, update).await,
        Statement::Delete(delete) => delete::execute_delete(ctx, delete).await,
        Statement::CreateTable(_) | Statement::DropTable(_) => Err(DbError::UnsupportedOperation(
            "DDL is executed outside transactions".into(),
        )),
    }
}
