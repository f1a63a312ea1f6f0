pub mod auth;
pub mod config;
pub mod pool;

use crate::core::{DbError, Result, Row, Value};
use crate::facade::Database;
use crate::parser::Statement;
use crate::result::QueryResult;
use crate::transaction::{HandleEvent, HandleState, Transaction, TransactionId};
use auth::User;
use std::time::Duration;
use tracing::{debug, warn};

/// Database connection handle
///
/// A connection starts in auto-commit mode: every statement is its own
/// transaction. `set_auto_commit(false)` switches to manual mode, where
/// statements accumulate in one transaction until `commit()` or
/// `rollback()`. Reads inside that transaction see its own writes.
pub struct Connection {
    id: u64,
    user: User,
    db: Database,
    state: HandleState,
    transaction: Option<Transaction>,
    lock_timeout: Duration,
}

impl Connection {
    pub(crate) fn new(id: u64, user: User, db: Database, lock_timeout: Duration) -> Self {
        Self {
            id,
            user,
            db,
            state: HandleState::AutoCommit,
            transaction: None,
            lock_timeout,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn username(&self) -> &str {
        self.user.username()
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    pub fn auto_commit(&self) -> bool {
        !self.state.is_manual()
    }

    pub fn is_in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.state == HandleState::Closed
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    pub fn set_lock_timeout(&mut self, timeout: Duration) {
        self.lock_timeout = timeout;
    }

    /// Runs a statement and returns the number of rows it changed.
    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        let stmt = self.prepare(sql)?;
        Ok(self.run(&stmt, params).await?.affected_rows)
    }

    pub async fn query(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let stmt = self.prepare(sql)?;
        self.run(&stmt, params).await
    }

    /// First row of a query, or `NotFound` when it matched nothing.
    pub async fn query_one(&mut self, sql: &str, params: &[Value]) -> Result<Row> {
        let stmt = self.prepare(sql)?;
        let result = self.run(&stmt, params).await?;

        result.rows.into_iter().next().ok_or_else(|| {
            let key = params
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            DbError::NotFound {
                table: stmt.table_name().to_string(),
                key,
            }
        })
    }

    fn prepare(&self, sql: &str) -> Result<Statement> {
        if self.is_closed() {
            return Err(DbError::ConnectionClosed(self.id));
        }
        self.db.parse(sql)
    }

    async fn run(&mut self, stmt: &Statement, params: &[Value]) -> Result<QueryResult> {
        debug!(connection = self.id, state = %self.state, table = stmt.table_name(), "executing statement");

        if matches!(stmt, Statement::CreateTable(_) | Statement::DropTable(_)) {
            return self.db.execute_ddl(stmt);
        }

        if self.state.is_manual() {
            self.begin_if_needed()?;
            let lock_timeout = self.lock_timeout;
            let txn = self
                .transaction
                .as_mut()
                .ok_or_else(|| DbError::InvalidState("no open transaction".into()))?;
            return self.db.execute_in(txn, stmt, params, lock_timeout).await;
        }

        let mut txn = Transaction::new(TransactionId::new());
        match self.db.execute_in(&mut txn, stmt, params, self.lock_timeout).await {
            Ok(result) => {
                self.db.commit_transaction(&mut txn)?;
                Ok(result)
            }
            Err(e) => {
                if let Err(rollback_err) = self.db.rollback_transaction(&mut txn) {
                    warn!(connection = self.id, error = %rollback_err, "auto-commit rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Opens the next transaction of a manual-mode connection.
    fn begin_if_needed(&mut self) -> Result<()> {
        if self.transaction.is_some() {
            return Ok(());
        }
        if self.state != HandleState::ManualActive {
            self.state = self.state.transition(HandleEvent::Begin)?;
        }
        self.transaction = Some(Transaction::new(TransactionId::new()));
        Ok(())
    }

    /// Switches between auto-commit and manual mode.
    ///
    /// Enabling auto-commit while a transaction has pending work is rejected;
    /// commit or roll back first. An untouched transaction is discarded.
    pub fn set_auto_commit(&mut self, enabled: bool) -> Result<()> {
        if !enabled {
            let next = self.state.transition(HandleEvent::DisableAutoCommit)?;
            let was_auto = self.state == HandleState::AutoCommit;
            self.state = next;
            if was_auto {
                self.begin_if_needed()?;
            }
            return Ok(());
        }

        if self.state == HandleState::ManualActive {
            let pending = self.transaction.as_ref().is_some_and(|txn| !txn.is_empty());
            if pending {
                return Err(DbError::InvalidState(
                    "cannot enable auto-commit with an open transaction; commit or roll back first"
                        .into(),
                ));
            }
            self.rollback()?;
        }

        self.state = self.state.transition(HandleEvent::EnableAutoCommit)?;
        Ok(())
    }

    /// Commits the open manual-mode transaction.
    pub fn commit(&mut self) -> Result<()> {
        let next = self.state.transition(HandleEvent::Commit)?;

        match self.transaction.take() {
            Some(mut txn) => match self.db.commit_transaction(&mut txn) {
                Ok(_) => {
                    self.state = next;
                    Ok(())
                }
                Err(e) => {
                    self.state = self.state.transition(HandleEvent::Rollback)?;
                    Err(e)
                }
            },
            None => {
                self.state = next;
                Ok(())
            }
        }
    }

    /// Discards the open manual-mode transaction.
    pub fn rollback(&mut self) -> Result<()> {
        let next = self.state.transition(HandleEvent::Rollback)?;
        self.state = next;

        match self.transaction.take() {
            Some(mut txn) => self.db.rollback_transaction(&mut txn),
            None => Ok(()),
        }
    }

    /// Rolls back whatever is open and restores auto-commit, then marks the
    /// connection as back in the pool.
    pub(crate) fn reset_for_pool(&mut self) -> Result<()> {
        let mut outcome = Ok(());

        if self.state == HandleState::ManualActive {
            warn!(connection = self.id, "returned to pool with an open transaction; rolling back");
            outcome = self.rollback();
        }
        if self.state.is_manual() {
            self.state = self.state.transition(HandleEvent::EnableAutoCommit)?;
        }

        self.state = self.state.transition(HandleEvent::Release)?;
        outcome
    }

    pub(crate) fn mark_acquired(&mut self) -> Result<()> {
        self.state = self.state.transition(HandleEvent::Acquire)?;
        Ok(())
    }

    /// Closes the connection, rolling back anything still open.
    pub fn close(&mut self) -> Result<()> {
        let outcome = match self.transaction.take() {
            Some(mut txn) => self.db.rollback_transaction(&mut txn),
            None => Ok(()),
        };
        self.state = self.state.transition(HandleEvent::Close)?;
        outcome
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(mut txn) = self.transaction.take() {
            if let Err(e) = self.db.rollback_transaction(&mut txn) {
                warn!(connection = self.id, error = %e, "rollback on drop failed");
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user", &self.user.username())
            .field("state", &self.state)
            .finish()
    }
}
