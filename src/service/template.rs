use crate::connection::Connection;
use crate::connection::pool::ConnectionPool;
use crate::core::{DbError, ErrorKind, Result};
use futures::future::BoxFuture;
use std::collections::HashMap;
use tracing::{debug, error, warn};

/// Decides whether a failed unit of work rolls back.
///
/// Without an override the error's own answer is used
/// ([`DbError::rolls_back`]): every kind rolls back except application
/// errors raised with [`DbError::committing`].
#[derive(Debug, Clone, Default)]
pub struct RollbackPolicy {
    overrides: HashMap<ErrorKind, bool>,
}

impl RollbackPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit the work done so far when the unit fails with `kind`.
    pub fn commit_on(mut self, kind: ErrorKind) -> Self {
        self.overrides.insert(kind, false);
        self
    }

    pub fn rollback_on(mut self, kind: ErrorKind) -> Self {
        self.overrides.insert(kind, true);
        self
    }

    pub fn should_rollback(&self, err: &DbError) -> bool {
        match self.overrides.get(&err.kind()) {
            Some(rollback) => *rollback,
            None => err.rolls_back(),
        }
    }
}

/// Runs caller-supplied work inside a transaction it owns.
///
/// The template checks out a connection, disables auto-commit, runs the
/// work, commits on success, consults the [`RollbackPolicy`] on failure, and
/// releases the connection whatever happened. The work's own error is
/// returned unchanged.
///
/// ```no_run
/// # use membertx::{ConnectionPool, TransactionTemplate, Value};
/// # async fn demo(pool: ConnectionPool) -> membertx::Result<()> {
/// let template = TransactionTemplate::new(pool);
/// let moved = template
///     .execute(|conn| {
///         Box::pin(async move {
///             conn.execute(
///                 "UPDATE member SET money = ? WHERE member_id = ?",
///                 &[Value::Integer(0), Value::from("memberA")],
///             )
///             .await
///         })
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TransactionTemplate {
    pool: ConnectionPool,
    policy: RollbackPolicy,
}

impl TransactionTemplate {
    pub fn new(pool: ConnectionPool) -> Self {
        Self::with_policy(pool, RollbackPolicy::default())
    }

    pub fn with_policy(pool: ConnectionPool, policy: RollbackPolicy) -> Self {
        Self { pool, policy }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn policy(&self) -> &RollbackPolicy {
        &self.policy
    }

    pub async fn execute<T, F>(&self, work: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c mut Connection) -> BoxFuture<'c, Result<T>>,
    {
        let mut conn = self.pool.get_connection().await?;

        if let Err(e) = conn.set_auto_commit(false) {
            conn.release_logged();
            return Err(e);
        }

        let outcome = work(&mut *conn).await;

        let result = match outcome {
            Ok(value) => conn.commit().map(|()| value),
            Err(e) if self.policy.should_rollback(&e) => {
                debug!(error = %e, "rolling back unit of work");
                if let Err(rollback_err) = conn.rollback() {
                    error!(error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, "unit of work failed; committing per rollback policy");
                match conn.commit() {
                    Ok(()) => Err(e),
                    Err(commit_err) => {
                        error!(error = %commit_err, cause = %e, "commit after failure failed");
                        Err(commit_err)
                    }
                }
            }
        };

        conn.release_logged();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RollbackPolicy::default();
        assert!(policy.should_rollback(&DbError::not_found("member", "A")));
        assert!(policy.should_rollback(&DbError::aborting("stop")));
        assert!(!policy.should_rollback(&DbError::committing("keep")));
    }

    #[test]
    fn test_overrides() {
        let policy = RollbackPolicy::new()
            .commit_on(ErrorKind::NotFound)
            .rollback_on(ErrorKind::Application);

        assert!(!policy.should_rollback(&DbError::not_found("member", "A")));
        assert!(policy.should_rollback(&DbError::committing("keep")));
        assert!(policy.should_rollback(&DbError::ValidationFailed("x".into())));
    }
}
