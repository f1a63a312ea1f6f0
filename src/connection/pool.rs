use super::{Connection, config::ConnectionConfig};
use crate::core::{DbError, Result};
use crate::facade::Database;
use serde::Serialize;
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, warn};

/// Connection pool
///
/// At most `max_connections` guards are out at once; `get_connection` waits
/// up to `connect_timeout` for one to come back and then fails with
/// `PoolExhausted`. Returned connections are reused until they exceed
/// `max_lifetime` or sit idle longer than `idle_timeout`.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    config: ConnectionConfig,
    db: Database,
    permits: Arc<Semaphore>,
    available: Mutex<VecDeque<PooledConnection>>,
    total_connections: AtomicUsize,
    checkouts: AtomicU64,
    checkins: AtomicU64,
}

/// A connection from the pool
struct PooledConnection {
    connection: Connection,
    created_at: Instant,
    last_used: Instant,
}

impl PooledConnection {
    fn new(connection: Connection) -> Self {
        let now = Instant::now();
        Self {
            connection,
            created_at: now,
            last_used: now,
        }
    }

    fn is_expired(&self, max_lifetime: Option<Duration>) -> bool {
        max_lifetime.is_some_and(|lifetime| self.created_at.elapsed() > lifetime)
    }

    fn is_idle_too_long(&self, idle_timeout: Option<Duration>) -> bool {
        idle_timeout.is_some_and(|timeout| self.last_used.elapsed() > timeout)
    }
}

impl PoolInner {
    fn available(&self) -> MutexGuard<'_, VecDeque<PooledConnection>> {
        // The queue stays consistent even if a holder panicked
        self.available.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens a connection parked in the released state.
    fn open_connection(&self) -> Result<PooledConnection> {
        let mut connection = self
            .db
            .connect(&self.config.username, &self.config.password)?;
        connection.set_lock_timeout(self.config.lock_timeout);
        connection.reset_for_pool()?;

        self.total_connections.fetch_add(1, Ordering::SeqCst);
        debug!(connection = connection.id(), database = self.db.name(), "pool opened connection");
        Ok(PooledConnection::new(connection))
    }

    fn take_available(&self) -> Option<PooledConnection> {
        let mut available = self.available();

        let before = available.len();
        available.retain(|pooled| {
            !pooled.is_expired(self.config.max_lifetime)
                && !pooled.is_idle_too_long(self.config.idle_timeout)
        });
        let removed = before - available.len();
        if removed > 0 {
            self.total_connections.fetch_sub(removed, Ordering::SeqCst);
            debug!(removed, "pool evicted expired connections");
        }

        available.pop_front()
    }

    /// Resets a returned connection and parks it for reuse. A connection
    /// that cannot be reset is discarded.
    fn check_in(&self, pooled: PooledConnection) -> Result<()> {
        let PooledConnection {
            mut connection,
            created_at,
            ..
        } = pooled;
        let id = connection.id();

        let outcome = connection.reset_for_pool();
        self.checkins.fetch_add(1, Ordering::SeqCst);

        match outcome {
            Ok(()) => {
                self.available().push_back(PooledConnection {
                    connection,
                    created_at,
                    last_used: Instant::now(),
                });
                debug!(connection = id, "connection returned to pool");
                Ok(())
            }
            Err(e) => {
                self.total_connections.fetch_sub(1, Ordering::SeqCst);
                warn!(connection = id, error = %e, "discarding connection that failed to reset");
                Err(e)
            }
        }
    }
}

impl ConnectionPool {
    /// Creates a pool over the registered database named in `config`.
    pub async fn new(config: ConnectionConfig) -> Result<Self> {
        let db = Database::open_named(&config.database)?;
        Self::new_with_db(config, db).await
    }

    /// Create a new connection pool over a specific database instance
    pub async fn new_with_db(config: ConnectionConfig, db: Database) -> Result<Self> {
        config.validate().map_err(DbError::ConfigError)?;

        let pool = Self {
            inner: Arc::new(PoolInner {
                permits: Arc::new(Semaphore::new(config.max_connections)),
                config,
                db,
                available: Mutex::new(VecDeque::new()),
                total_connections: AtomicUsize::new(0),
                checkouts: AtomicU64::new(0),
                checkins: AtomicU64::new(0),
            }),
        };

        pool.ensure_min_connections()?;

        Ok(pool)
    }

    /// Create a new connection pool with an isolated database instance
    ///
    /// Useful for testing to ensure tests don't interfere with each other.
    pub async fn new_isolated(config: ConnectionConfig) -> Result<Self> {
        let db = Database::new_isolated()?;
        Self::new_with_db(config, db).await
    }

    pub fn database(&self) -> &Database {
        &self.inner.db
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    /// Checks a connection out of the pool.
    pub async fn get_connection(&self) -> Result<PoolGuard> {
        let wait = self.inner.config.connect_timeout;

        let permit = tokio::time::timeout(wait, Arc::clone(&self.inner.permits).acquire_owned())
            .await
            .map_err(|_| DbError::PoolExhausted(wait))?
            .map_err(|_| DbError::InvalidState("connection pool is closed".into()))?;

        let mut pooled = match self.inner.take_available() {
            Some(pooled) => pooled,
            None => self.inner.open_connection()?,
        };
        pooled.connection.mark_acquired()?;
        pooled.last_used = Instant::now();

        self.inner.checkouts.fetch_add(1, Ordering::SeqCst);
        debug!(connection = pooled.connection.id(), "connection checked out");

        Ok(PoolGuard {
            connection: Some(pooled),
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    fn ensure_min_connections(&self) -> Result<()> {
        while self.inner.total_connections.load(Ordering::SeqCst) < self.inner.config.min_connections {
            let pooled = self.inner.open_connection()?;
            self.inner.available().push_back(pooled);
        }
        Ok(())
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        let available = self.inner.available().len();
        let total = self.inner.total_connections.load(Ordering::SeqCst);

        PoolStats {
            total_connections: total,
            available_connections: available,
            active_connections: total.saturating_sub(available),
            max_connections: self.inner.config.max_connections,
            checkouts: self.inner.checkouts.load(Ordering::SeqCst),
            checkins: self.inner.checkins.load(Ordering::SeqCst),
        }
    }
}

/// Connection pool statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub total_connections: usize,
    pub available_connections: usize,
    pub active_connections: usize,
    pub max_connections: usize,
    /// Guards handed out since the pool was created
    pub checkouts: u64,
    /// Guards given back since the pool was created
    pub checkins: u64,
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pool Stats: {}/{} active, {} available, max {}, {} checkouts, {} checkins",
            self.active_connections,
            self.total_connections,
            self.available_connections,
            self.max_connections,
            self.checkouts,
            self.checkins
        )
    }
}

/// RAII guard for pooled connections
///
/// `release()` hands the connection back and reports whether resetting it
/// worked. If the guard is dropped without `release()`, the same steps run
/// in `Drop` and failures are only logged. Either way the connection is
/// checked in exactly once.
pub struct PoolGuard {
    connection: Option<PooledConnection>,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl PoolGuard {
    /// Rolls back anything still open, restores auto-commit and returns the
    /// connection to the pool.
    pub fn release(mut self) -> Result<()> {
        match self.connection.take() {
            Some(pooled) => self.pool.check_in(pooled),
            None => Ok(()),
        }
    }

    /// `release()` for cleanup paths: a failure is logged, never returned.
    pub fn release_logged(self) {
        let id = self.id();
        if let Err(e) = self.release() {
            error!(connection = id, error = %e, "failed to release connection");
        }
    }
}

impl Deref for PoolGuard {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self
            .connection
            .as_ref()
            .expect("Connection already returned to pool")
            .connection
    }
}

impl DerefMut for PoolGuard {
    fn deref_mut(&mut self) -> &mut Connection {
        &mut self
            .connection
            .as_mut()
            .expect("Connection already returned to pool")
            .connection
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        if let Some(pooled) = self.connection.take() {
            let id = pooled.connection.id();
            if let Err(e) = self.pool.check_in(pooled) {
                error!(connection = id, error = %e, "release on drop failed");
            }
        }
    }
}
