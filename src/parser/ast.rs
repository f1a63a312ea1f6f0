use crate::core::{DataType, DbError, Result, Value};

/// Root statement type
#[derive(Debug, Clone)]
pub enum Statement {
    CreateTable(CreateTableStmt),
    DropTable(DropTableStmt),
    Insert(InsertStmt),
    Select(SelectStmt),
    Update(UpdateStmt),
    Delete(DeleteStmt),
}

impl Statement {
    pub fn table_name(&self) -> &str {
        match self {
            Statement::CreateTable(s) => &s.table_name,
            Statement::DropTable(s) => &s.table_name,
            Statement::Insert(s) => &s.table_name,
            Statement::Select(s) => &s.table_name,
            Statement::Update(s) => &s.table_name,
            Statement::Delete(s) => &s.table_name,
        }
    }
}

/// A value slot in a statement: either written inline or bound at execution.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(Value),
    /// Zero-based position in the parameter list.
    Param(usize),
}

impl Operand {
    pub fn resolve(&self, params: &[Value]) -> Result<Value> {
        match self {
            Operand::Literal(value) => Ok(value.clone()),
            Operand::Param(idx) => params.get(*idx).cloned().ok_or_else(|| {
                DbError::ParseError(format!(
                    "Missing parameter {} (got {} parameters)",
                    idx + 1,
                    params.len()
                ))
            }),
        }
    }
}

/// `column = operand`, the only predicate the engine understands.
#[derive(Debug, Clone)]
pub struct KeyFilter {
    pub column: String,
    pub value: Operand,
}

#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub primary_key: bool,
}

#[derive(Debug, Clone)]
pub struct CreateTableStmt {
    pub table_name: String,
    pub columns: Vec<ColumnDef>,
    pub if_not_exists: bool,
}

#[derive(Debug, Clone)]
pub struct DropTableStmt {
    pub table_name: String,
    pub if_exists: bool,
}

#[derive(Debug, Clone)]
pub struct InsertStmt {
    pub table_name: String,
    pub columns: Option<Vec<String>>,
    pub values: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    All,
    Columns(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct SelectStmt {
    pub table_name: String,
    pub projection: Projection,
    pub filter: Option<KeyFilter>,
    /// `FOR UPDATE`: the read takes the row lock inside a transaction.
    pub for_update: bool,
}

#[derive(Debug, Clone)]
pub struct Assignment {
    pub column: String,
    pub value: Operand,
}

#[derive(Debug, Clone)]
pub struct UpdateStmt {
    pub table_name: String,
    pub assignments: Vec<Assignment>,
    pub filter: KeyFilter,
}

#[derive(Debug, Clone)]
pub struct DeleteStmt {
    pub table_name: String,
    pub filter: KeyFilter,
}
