use crate::connection::Connection;
use crate::connection::auth::AuthManager;
use crate::core::{Column, DbError, Result, Value};
use crate::executor::{self, ExecutionContext};
use crate::parser::SqlParserAdapter;
use crate::parser::ast::{CreateTableStmt, DropTableStmt, Statement};
use crate::result::QueryResult;
use crate::storage::{InMemoryStorage, TableSchema};
use crate::transaction::{LockManager, Transaction};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::{debug, info};

// Named databases shared by every pool and connection in the process
lazy_static! {
    static ref REGISTRY: Mutex<HashMap<String, Database>> = Mutex::new(HashMap::new());
}

static ISOLATED_SEQ: AtomicU64 = AtomicU64::new(1);

/// An in-process database: committed tables, row locks and logins.
///
/// `Database` is a cheap handle; clones share the same state.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

struct DatabaseInner {
    name: String,
    parser: SqlParserAdapter,
    storage: RwLock<InMemoryStorage>,
    locks: LockManager,
    auth: AuthManager,
    next_connection_id: AtomicU64,
}

impl Database {
    pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

    fn build(name: String, auth: AuthManager) -> Self {
        Self {
            inner: Arc::new(DatabaseInner {
                name,
                parser: SqlParserAdapter::new(),
                storage: RwLock::new(InMemoryStorage::new()),
                locks: LockManager::new(),
                auth,
                next_connection_id: AtomicU64::new(1),
            }),
        }
    }

    /// Returns the registered database called `name`, creating it with the
    /// default login on first use.
    pub fn open_named(name: &str) -> Result<Self> {
        let mut registry = REGISTRY.lock()?;

        if let Some(db) = registry.get(name) {
            return Ok(db.clone());
        }

        let db = Self::build(name.to_string(), AuthManager::new()?);
        registry.insert(name.to_string(), db.clone());
        info!(database = name, "database created");
        Ok(db)
    }

    /// A private database that no URL can reach. Used by tests and demos.
    pub fn new_isolated() -> Result<Self> {
        let name = format!("isolated-{}", ISOLATED_SEQ.fetch_add(1, Ordering::Relaxed));
        Ok(Self::build(name, AuthManager::new()?))
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn auth(&self) -> &AuthManager {
        &self.inner.auth
    }

    pub fn locks(&self) -> &LockManager {
        &self.inner.locks
    }

    /// Opens an unpooled connection in auto-commit mode.
    pub fn connect(&self, username: &str, password: &str) -> Result<Connection> {
        let user = self.inner.auth.authenticate(username, password)?;
        let id = self.inner.next_connection_id.fetch_add(1, Ordering::Relaxed);
        debug!(database = %self.inner.name, connection = id, user = username, "connection opened");
        Ok(Connection::new(id, user, self.clone(), Self::DEFAULT_LOCK_TIMEOUT))
    }

    pub fn table_exists(&self, name: &str) -> Result<bool> {
        Ok(self.inner.storage.read()?.table_exists(name))
    }

    pub fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.inner.storage.read()?.list_tables())
    }

    pub fn row_count(&self, table: &str) -> Result<usize> {
        self.inner.storage.read()?.row_count(table)
    }

    pub(crate) fn parse(&self, sql: &str) -> Result<Statement> {
        self.inner.parser.parse(sql)
    }

    /// Runs CREATE/DROP TABLE directly against committed storage.
    pub(crate) fn execute_ddl(&self, stmt: &Statement) -> Result<QueryResult> {
        match stmt {
            Statement::CreateTable(create) => self.create_table(create),
            Statement::DropTable(drop) => self.drop_table(drop),
            other => Err(DbError::UnsupportedOperation(format!(
                "'{}' statement is not DDL",
                other.table_name()
            ))),
        }
    }

    fn create_table(&self, create: &CreateTableStmt) -> Result<QueryResult> {
        let columns = create
            .columns
            .iter()
            .map(|def| {
                let mut column = Column::new(def.name.clone(), def.data_type.clone());
                if def.primary_key {
                    column = column.primary_key();
                } else if !def.nullable {
                    column = column.not_null();
                }
                column
            })
            .collect();
        let schema = TableSchema::new(create.table_name.clone(), columns)?;

        let mut storage = self.inner.storage.write()?;
        if create.if_not_exists && storage.table_exists(&create.table_name) {
            return Ok(QueryResult::empty());
        }
        storage.create_table(schema)?;

        debug!(table = %create.table_name, "table created");
        Ok(QueryResult::empty())
    }

    fn drop_table(&self, drop: &DropTableStmt) -> Result<QueryResult> {
        let mut storage = self.inner.storage.write()?;
        if drop.if_exists && !storage.table_exists(&drop.table_name) {
            return Ok(QueryResult::empty());
        }
        storage.drop_table(&drop.table_name)?;

        debug!(table = %drop.table_name, "table dropped");
        Ok(QueryResult::empty())
    }

    /// Runs a data statement inside `txn`. A failed statement leaves no
    /// buffered writes behind; the locks it took stay with the transaction.
    pub(crate) async fn execute_in(
        &self,
        txn: &mut Transaction,
        stmt: &Statement,
        params: &[Value],
        lock_timeout: Duration,
    ) -> Result<QueryResult> {
        let savepoint = txn.savepoint();

        let result = {
            let mut ctx = ExecutionContext {
                storage: &self.inner.storage,
                locks: &self.inner.locks,
                txn: &mut *txn,
                params,
                lock_timeout,
            };
            executor::execute(&mut ctx, stmt).await
        };

        if result.is_err() {
            txn.rollback_to(savepoint);
        }
        result
    }

    /// Applies the transaction's change log and releases its row locks.
    /// The locks are released even when the commit fails.
    pub(crate) fn commit_transaction(&self, txn: &mut Transaction) -> Result<usize> {
        let outcome = txn.commit().and_then(|changes| {
            let mut storage = self.inner.storage.write()?;
            storage.apply(&changes)?;
            Ok(changes.len())
        });

        let released = self.release_locks(txn);
        let applied = outcome?;
        released?;

        debug!(txn = %txn.id(), changes = applied, "transaction committed");
        Ok(applied)
    }

    /// Discards the change log and releases the row locks.
    pub(crate) fn rollback_transaction(&self, txn: &mut Transaction) -> Result<()> {
        let outcome = txn.rollback();
        let released = self.release_locks(txn);
        outcome?;
        released?;

        debug!(txn = %txn.id(), "transaction rolled back");
        Ok(())
    }

    fn release_locks(&self, txn: &mut Transaction) -> Result<()> {
        let keys = txn.take_locks();
        self.inner.locks.release_all(txn.id(), &keys)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.inner.name)
            .finish_non_exhaustive()
    }
}
