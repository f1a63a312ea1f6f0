use sqlparser::ast as sql_ast;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::core::{DataType, DbError, Result, Value};
use crate::parser::ast::*;

/// Translates SQL text into the engine's statement model.
///
/// `GenericDialect` is used so that `?` tokens become positional
/// placeholders. `$n` placeholders are accepted as well.
pub struct SqlParserAdapter {
    dialect: GenericDialect,
}

/// Hands out positions to `?` placeholders in the order they appear.
#[derive(Default)]
struct ParamCounter {
    next: usize,
}

impl ParamCounter {
    fn placeholder(&mut self, token: &str) -> Result<usize> {
        if let Some(n) = token.strip_prefix('$') {
            let n: usize = n
                .parse()
                .map_err(|_| DbError::ParseError(format!("Invalid placeholder '{}'", token)))?;
            if n == 0 {
                return Err(DbError::ParseError("Placeholders are numbered from $1".into()));
            }
            return Ok(n - 1);
        }

        let idx = self.next;
        self.next += 1;
        Ok(idx)
    }
}

impl SqlParserAdapter {
    pub fn new() -> Self {
        Self {
            dialect: GenericDialect {},
        }
    }

    pub fn parse(&self, sql: &str) -> Result<Statement> {
        let mut statements = Parser::parse_sql(&self.dialect, sql)
            .map_err(|e| DbError::ParseError(e.to_string()))?;

        if statements.len() != 1 {
            return Err(DbError::ParseError(format!(
                "Expected exactly one statement, found {}",
                statements.len()
            )));
        }

        let mut params = ParamCounter::default();
        self.convert_statement(statements.remove(0), &mut params)
    }

    fn convert_statement(
        &self,
        stmt: sql_ast::Statement,
        params: &mut ParamCounter,
    ) -> Result<Statement> {
        match stmt {
            sql_ast::Statement::CreateTable(create) => {
                Ok(Statement::CreateTable(self.convert_create_table(create)?))
            }
            sql_ast::Statement::Drop {
                object_type,
                names,
                if_exists,
                ..
            } => {
                if let sql_ast::ObjectType::Table = object_type {
                    Ok(Statement::DropTable(self.convert_drop_table(names, if_exists)?))
                } else {
                    Err(DbError::UnsupportedOperation(format!(
                        "DROP {} not supported",
                        object_type
                    )))
                }
            }
            sql_ast::Statement::Insert(insert) => {
                Ok(Statement::Insert(self.convert_insert(insert, params)?))
            }
            sql_ast::Statement::Query(query) => {
                Ok(Statement::Select(self.convert_query(*query, params)?))
            }
            sql_ast::Statement::Update {
                table,
                assignments,
                selection,
                ..
            } => Ok(Statement::Update(self.convert_update(
                table,
                assignments,
                selection,
                params,
            )?)),
            sql_ast::Statement::Delete(delete) => {
                Ok(Statement::Delete(self.convert_delete(delete, params)?))
            }
            other => Err(DbError::UnsupportedOperation(format!(
                "Statement not supported: {}",
                other
            ))),
        }
    }

    fn convert_create_table(&self, create: sql_ast::CreateTable) -> Result<CreateTableStmt> {
        let table_name = extract_table_name(&create.name)?;
        let columns = create
            .columns
            .into_iter()
            .map(|col| self.convert_column_def(col))
            .collect::<Result<Vec<_>>>()?;

        if columns.iter().filter(|c| c.primary_key).count() > 1 {
            return Err(DbError::UnsupportedOperation(
                "Composite primary keys are not supported".into(),
            ));
        }

        Ok(CreateTableStmt {
            table_name,
            columns,
            if_not_exists: create.if_not_exists,
        })
    }

    fn convert_drop_table(
        &self,
        names: Vec<sql_ast::ObjectName>,
        if_exists: bool,
    ) -> Result<DropTableStmt> {
        if names.len() != 1 {
            return Err(DbError::UnsupportedOperation(
                "Only single table DROP supported".into(),
            ));
        }

        Ok(DropTableStmt {
            table_name: extract_table_name(&names[0])?,
            if_exists,
        })
    }

    fn convert_column_def(&self, col: sql_ast::ColumnDef) -> Result<ColumnDef> {
        let data_type = self.convert_data_type(&col.data_type)?;
        let primary_key = col
            .options
            .iter()
            .any(|opt| opt.option.to_string().starts_with("PRIMARY KEY"));
        let not_null = col
            .options
            .iter()
            .any(|opt| matches!(opt.option, sql_ast::ColumnOption::NotNull));

        Ok(ColumnDef {
            name: col.name.value,
            data_type,
            nullable: !(not_null || primary_key),
            primary_key,
        })
    }

    fn convert_data_type(&self, dt: &sql_ast::DataType) -> Result<DataType> {
        match dt {
            sql_ast::DataType::Int(_)
            | sql_ast::DataType::Integer(_)
            | sql_ast::DataType::BigInt(_) => Ok(DataType::Integer),

            sql_ast::DataType::Text
            | sql_ast::DataType::Varchar(_)
            | sql_ast::DataType::Char(_)
            | sql_ast::DataType::String(_) => Ok(DataType::Text),

            _ => Err(DbError::TypeMismatch(format!(
                "Unsupported data type: {}",
                dt
            ))),
        }
    }

    fn convert_insert(
        &self,
        insert: sql_ast::Insert,
        params: &mut ParamCounter,
    ) -> Result<InsertStmt> {
        let table_name = insert.table.to_string();

        let columns = if insert.columns.is_empty() {
            None
        } else {
            Some(insert.columns.into_iter().map(|id| id.value).collect())
        };

        let Some(source) = insert.source else {
            return Err(DbError::UnsupportedOperation(
                "INSERT requires a VALUES clause".into(),
            ));
        };

        let sql_ast::SetExpr::Values(vals) = *source.body else {
            return Err(DbError::UnsupportedOperation(
                "Only VALUES clause supported".into(),
            ));
        };

        if vals.rows.len() != 1 {
            return Err(DbError::UnsupportedOperation(
                "INSERT supports exactly one row".into(),
            ));
        }

        let values = vals
            .rows
            .into_iter()
            .flatten()
            .map(|expr| convert_operand(expr, params))
            .collect::<Result<Vec<_>>>()?;

        Ok(InsertStmt {
            table_name,
            columns,
            values,
        })
    }

    fn convert_query(
        &self,
        query: sql_ast::Query,
        params: &mut ParamCounter,
    ) -> Result<SelectStmt> {
        let for_update = query
            .locks
            .iter()
            .any(|lock| matches!(lock.lock_type, sql_ast::LockType::Update));

        let sql_ast::SetExpr::Select(select) = *query.body else {
            return Err(DbError::UnsupportedOperation(
                "Only SELECT queries supported".into(),
            ));
        };
        let select = *select;

        if select.from.len() != 1 || !select.from[0].joins.is_empty() {
            return Err(DbError::UnsupportedOperation(
                "SELECT must read from exactly one table".into(),
            ));
        }
        let table_name = match &select.from[0].relation {
            sql_ast::TableFactor::Table { name, .. } => extract_table_name(name)?,
            _ => {
                return Err(DbError::UnsupportedOperation(
                    "Complex table references not supported in SELECT".into(),
                ));
            }
        };

        let mut columns = Vec::new();
        let mut wildcard = false;
        for item in select.projection {
            match item {
                sql_ast::SelectItem::Wildcard(_) => wildcard = true,
                sql_ast::SelectItem::UnnamedExpr(expr) => columns.push(column_name(&expr)?),
                other => {
                    return Err(DbError::UnsupportedOperation(format!(
                        "Unsupported projection: {}",
                        other
                    )));
                }
            }
        }
        let projection = if wildcard {
            Projection::All
        } else {
            Projection::Columns(columns)
        };

        let filter = select
            .selection
            .map(|expr| convert_key_filter(expr, params))
            .transpose()?;

        Ok(SelectStmt {
            table_name,
            projection,
            filter,
            for_update,
        })
    }

    fn convert_update(
        &self,
        table: sql_ast::TableWithJoins,
        assignments: Vec<sql_ast::Assignment>,
        selection: Option<sql_ast::Expr>,
        params: &mut ParamCounter,
    ) -> Result<UpdateStmt> {
        let table_name = match table.relation {
            sql_ast::TableFactor::Table { name, .. } => extract_table_name(&name)?,
            _ => {
                return Err(DbError::UnsupportedOperation(
                    "Complex table references not supported in UPDATE".into(),
                ));
            }
        };

        let assignments = assignments
            .into_iter()
            .map(|assign| {
                let column = match assign.target {
                    sql_ast::AssignmentTarget::ColumnName(col_name) => {
                        if col_name.0.len() == 1 {
                            col_name.0[0].to_string()
                        } else {
                            return Err(DbError::UnsupportedOperation(
                                "Qualified column names not supported in UPDATE".into(),
                            ));
                        }
                    }
                    _ => {
                        return Err(DbError::UnsupportedOperation(
                            "Only simple column names supported in UPDATE".into(),
                        ));
                    }
                };

                let value = convert_operand(assign.value, params)?;

                Ok(Assignment { column, value })
            })
            .collect::<Result<Vec<_>>>()?;

        let Some(selection) = selection else {
            return Err(DbError::UnsupportedOperation(
                "UPDATE requires a WHERE clause on the key".into(),
            ));
        };

        Ok(UpdateStmt {
            table_name,
            assignments,
            filter: convert_key_filter(selection, params)?,
        })
    }

    fn convert_delete(
        &self,
        delete: sql_ast::Delete,
        params: &mut ParamCounter,
    ) -> Result<DeleteStmt> {
        let tables = match delete.from {
            sql_ast::FromTable::WithFromKeyword(tables) => tables,
            sql_ast::FromTable::WithoutKeyword(tables) => tables,
        };
        let Some(first) = tables.first() else {
            return Err(DbError::ParseError("DELETE requires a table name".into()));
        };
        let table_name = match &first.relation {
            sql_ast::TableFactor::Table { name, .. } => extract_table_name(name)?,
            _ => {
                return Err(DbError::UnsupportedOperation(
                    "Complex table references not supported in DELETE".into(),
                ));
            }
        };

        let Some(selection) = delete.selection else {
            return Err(DbError::UnsupportedOperation(
                "DELETE requires a WHERE clause on the key".into(),
            ));
        };

        Ok(DeleteStmt {
            table_name,
            filter: convert_key_filter(selection, params)?,
        })
    }
}

impl Default for SqlParserAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn convert_key_filter(expr: sql_ast::Expr, params: &mut ParamCounter) -> Result<KeyFilter> {
    match expr {
        sql_ast::Expr::Nested(inner) => convert_key_filter(*inner, params),
        sql_ast::Expr::BinaryOp {
            left,
            op: sql_ast::BinaryOperator::Eq,
            right,
        } => Ok(KeyFilter {
            column: column_name(&left)?,
            value: convert_operand(*right, params)?,
        }),
        other => Err(DbError::UnsupportedOperation(format!(
            "Only `column = value` predicates are supported, got: {}",
            other
        ))),
    }
}

fn column_name(expr: &sql_ast::Expr) -> Result<String> {
    match expr {
        sql_ast::Expr::Identifier(ident) => Ok(ident.value.clone()),
        sql_ast::Expr::CompoundIdentifier(parts) => parts
            .last()
            .map(|ident| ident.value.clone())
            .ok_or_else(|| DbError::ParseError("Empty column reference".into())),
        other => Err(DbError::UnsupportedOperation(format!(
            "Expected a column name, got: {}",
            other
        ))),
    }
}

fn convert_operand(expr: sql_ast::Expr, params: &mut ParamCounter) -> Result<Operand> {
    match expr {
        sql_ast::Expr::Value(v) => convert_value(v.value, params),
        sql_ast::Expr::Nested(inner) => convert_operand(*inner, params),
        sql_ast::Expr::UnaryOp {
            op: sql_ast::UnaryOperator::Minus,
            expr,
        } => match convert_operand(*expr, params)? {
            Operand::Literal(Value::Integer(n)) => n
                .checked_neg()
                .map(|n| Operand::Literal(Value::Integer(n)))
                .ok_or_else(|| DbError::Overflow(format!("-{}", n))),
            _ => Err(DbError::UnsupportedOperation(
                "Unary minus only applies to integer literals".into(),
            )),
        },
        other => Err(DbError::UnsupportedOperation(format!(
            "Expected a literal or placeholder, got: {}",
            other
        ))),
    }
}

fn convert_value(value: sql_ast::Value, params: &mut ParamCounter) -> Result<Operand> {
    match value {
        sql_ast::Value::Placeholder(token) => Ok(Operand::Param(params.placeholder(&token)?)),
        sql_ast::Value::Number(n, _) => n
            .parse::<i64>()
            .map(|n| Operand::Literal(Value::Integer(n)))
            .map_err(|_| DbError::TypeMismatch(format!("Not an integer literal: {}", n))),
        sql_ast::Value::SingleQuotedString(s) => Ok(Operand::Literal(Value::Text(s))),
        sql_ast::Value::Null => Ok(Operand::Literal(Value::Null)),
        other => Err(DbError::UnsupportedOperation(format!(
            "Unsupported literal: {}",
            other
        ))),
    }
}

fn extract_table_name(name: &sql_ast::ObjectName) -> Result<String> {
    name.0
        .last()
        .map(|ident| ident.to_string())
        .ok_or_else(|| DbError::ParseError("Invalid table name".into()))
}
