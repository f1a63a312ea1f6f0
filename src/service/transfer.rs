use crate::connection::Connection;
use crate::core::{DbError, Result};
use crate::repository::{Member, PooledMemberRepository};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

/// Move `amount` from one member to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_id: String,
    pub to_id: String,
    pub amount: i64,
}

impl TransferRequest {
    pub fn new(from_id: impl Into<String>, to_id: impl Into<String>, amount: i64) -> Self {
        Self {
            from_id: from_id.into(),
            to_id: to_id.into(),
            amount,
        }
    }

    /// Checks that need no data: distinct accounts and a positive amount.
    pub fn validate(&self) -> Result<()> {
        if self.from_id == self.to_id {
            return Err(DbError::ValidationFailed(format!(
                "cannot transfer from '{}' to itself",
                self.from_id
            )));
        }
        if self.amount <= 0 {
            return Err(DbError::ValidationFailed(format!(
                "transfer amount must be positive, got {}",
                self.amount
            )));
        }
        Ok(())
    }
}

/// Business rules of a transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Destination id that always fails validation after the debit.
    pub sentinel_id: String,
    /// Refuse transfers that would take the source below zero.
    ///
    /// On by default. With it off a debit may leave a negative balance and
    /// only arithmetic overflow stops the transfer.
    pub reject_overdraft: bool,
}

impl TransferConfig {
    pub fn sentinel_id(mut self, id: &str) -> Self {
        self.sentinel_id = id.to_string();
        self
    }

    pub fn reject_overdraft(mut self, reject: bool) -> Self {
        self.reject_overdraft = reject;
        self
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            sentinel_id: "ex".to_string(),
            reject_overdraft: true,
        }
    }
}

/// Debit and credit through `conn`. The caller owns the transaction.
///
/// Both rows are read (and, in manual mode, locked) in id order so that
/// opposite transfers between the same pair queue up instead of deadlocking.
pub(crate) async fn transfer_within(
    repository: &PooledMemberRepository,
    conn: &mut Connection,
    request: &TransferRequest,
    config: &TransferConfig,
) -> Result<()> {
    let (from, to) = if request.from_id <= request.to_id {
        let from = repository.find_by_id_in(conn, &request.from_id).await?;
        let to = repository.find_by_id_in(conn, &request.to_id).await?;
        (from, to)
    } else {
        let to = repository.find_by_id_in(conn, &request.to_id).await?;
        let from = repository.find_by_id_in(conn, &request.from_id).await?;
        (from, to)
    };

    let debited = from.money.checked_sub(request.amount).ok_or_else(|| {
        DbError::Overflow(format!("debit of {} from '{}'", request.amount, from.member_id))
    })?;
    if config.reject_overdraft && debited < 0 {
        return Err(DbError::ValidationFailed(format!(
            "insufficient funds in '{}': balance {}, requested {}",
            from.member_id, from.money, request.amount
        )));
    }

    repository.update_in(conn, &from.member_id, debited).await?;

    validate_destination(&to, config)?;

    let credited = to.money.checked_add(request.amount).ok_or_else(|| {
        DbError::Overflow(format!("credit of {} to '{}'", request.amount, to.member_id))
    })?;
    repository.update_in(conn, &to.member_id, credited).await?;

    Ok(())
}

fn validate_destination(to: &Member, config: &TransferConfig) -> Result<()> {
    if to.member_id == config.sentinel_id {
        return Err(DbError::ValidationFailed(format!(
            "transfer to '{}' is not allowed",
            to.member_id
        )));
    }
    Ok(())
}

/// Transfers with an explicit transaction boundary: the service checks out
/// a connection, switches it to manual mode, commits or rolls back, and
/// releases it on every path.
#[derive(Clone)]
pub struct TransferService {
    repository: PooledMemberRepository,
    config: TransferConfig,
}

impl TransferService {
    pub fn new(repository: PooledMemberRepository) -> Self {
        Self::with_config(repository, TransferConfig::default())
    }

    pub fn with_config(repository: PooledMemberRepository, config: TransferConfig) -> Self {
        Self { repository, config }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Any failure comes back as `TransferFailed` after the transaction has
    /// been rolled back and the connection released.
    #[instrument(name = "transfer", skip(self))]
    pub async fn transfer(&self, from_id: &str, to_id: &str, amount: i64) -> Result<()> {
        let request = TransferRequest::new(from_id, to_id, amount);
        self.execute(&request).await
    }

    pub async fn execute(&self, request: &TransferRequest) -> Result<()> {
        request.validate().map_err(DbError::transfer_failed)?;

        let mut conn = self
            .repository
            .pool()
            .get_connection()
            .await
            .map_err(DbError::transfer_failed)?;

        let outcome = match conn.set_auto_commit(false) {
            Ok(()) => transfer_within(&self.repository, &mut conn, request, &self.config).await,
            Err(e) => Err(e),
        };

        let outcome = match outcome {
            Ok(()) => conn.commit(),
            Err(e) => {
                if conn.state().in_transaction() {
                    if let Err(rollback_err) = conn.rollback() {
                        error!(error = %rollback_err, "rollback failed");
                    }
                }
                Err(e)
            }
        };

        conn.release_logged();

        match outcome {
            Ok(()) => {
                info!(from_id = %request.from_id, to_id = %request.to_id, amount = request.amount, "transfer committed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "transfer rolled back");
                Err(DbError::transfer_failed(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_validation() {
        assert!(TransferRequest::new("A", "B", 1).validate().is_ok());
        assert!(matches!(
            TransferRequest::new("A", "A", 1).validate(),
            Err(DbError::ValidationFailed(_))
        ));
        assert!(TransferRequest::new("A", "B", 0).validate().is_err());
        assert!(TransferRequest::new("A", "B", -5).validate().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = TransferConfig::default();
        assert_eq!(config.sentinel_id, "ex");
        assert!(config.reject_overdraft);
        assert!(!config.reject_overdraft(false).reject_overdraft);
    }

    #[test]
    fn test_sentinel_destination() {
        let config = TransferConfig::default();
        assert!(validate_destination(&Member::new("ex", 0), &config).is_err());
        assert!(validate_destination(&Member::new("B", 0), &config).is_ok());

        let custom = TransferConfig::default().sentinel_id("blocked");
        assert!(validate_destination(&Member::new("ex", 0), &custom).is_ok());
        assert!(validate_destination(&Member::new("blocked", 0), &custom).is_err());
    }
}
