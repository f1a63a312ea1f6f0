// ============================================================================
// Row Lock Manager
// ============================================================================
//
// Exclusive, re-entrant row locks keyed by (table, primary key). A lock is
// owned by one transaction until that transaction releases everything it
// holds at commit or rollback. Waiters park on a `Notify` and give up after
// the configured lock timeout.
//
// ============================================================================

use super::TransactionId;
use crate::core::{DbError, Result, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowKey {
    pub table: String,
    pub key: Value,
}

impl RowKey {
    pub fn new(table: impl Into<String>, key: Value) -> Self {
        Self {
            table: table.into(),
            key,
        }
    }
}

impl std::fmt::Display for RowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.table, self.key)
    }
}

#[derive(Default)]
pub struct LockManager {
    owners: Mutex<HashMap<RowKey, TransactionId>>,
    released: Notify,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the lock if it is free or already ours. Never waits.
    pub fn try_acquire(&self, key: &RowKey, owner: TransactionId) -> Result<bool> {
        let mut owners = self.owners.lock()?;
        match owners.get(key) {
            Some(current) if *current == owner => Ok(true),
            Some(_) => Ok(false),
            None => {
                owners.insert(key.clone(), owner);
                Ok(true)
            }
        }
    }

    /// Waits until the lock on `key` is granted to `owner`, or fails with
    /// `LockTimeout` once `timeout` has elapsed.
    pub async fn acquire(&self, key: &RowKey, owner: TransactionId, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;

        loop {
            // Registered before the check so a release in between is not missed.
            let notified = self.released.notified();

            if self.try_acquire(key, owner)? {
                trace!(%key, %owner, "row lock granted");
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(%key, %owner, "row lock wait timed out");
                return Err(DbError::LockTimeout {
                    table: key.table.clone(),
                    key: key.key.to_string(),
                });
            }

            let _ = tokio::time::timeout(deadline - now, notified).await;
        }
    }

    /// Releases every listed lock held by `owner` and wakes all waiters.
    pub fn release_all(&self, owner: TransactionId, keys: &[RowKey]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        {
            let mut owners = self.owners.lock()?;
            for key in keys {
                if owners.get(key) == Some(&owner) {
                    owners.remove(key);
                }
            }
        }

        self.released.notify_waiters();
        Ok(())
    }

    pub fn owner_of(&self, key: &RowKey) -> Result<Option<TransactionId>> {
        Ok(self.owners.lock()?.get(key).copied())
    }

    pub fn held_count(&self) -> Result<usize> {
        Ok(self.owners.lock()?.len())
    }
}
