use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("No row with key '{key}' in '{table}'")]
    NotFound { table: String, key: String },

    #[error("Duplicate key '{key}' in '{table}'")]
    DuplicateKey { table: String, key: String },

    #[error("Connection pool exhausted: no connection available within {0:?}")]
    PoolExhausted(std::time::Duration),

    #[error("Connection {0} is closed")]
    ConnectionClosed(u64),

    #[error("Authentication failed for user '{0}'")]
    AuthenticationFailed(String),

    #[error("Timed out waiting for row lock on '{table}'.'{key}'")]
    LockTimeout { table: String, key: String },

    #[error("Invalid connection state: {0}")]
    InvalidState(String),

    #[error("Arithmetic overflow: {0}")]
    Overflow(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Transfer failed: {source}")]
    TransferFailed {
        #[source]
        source: Box<DbError>,
    },

    #[error("{message}")]
    Application { message: String, rollback: bool },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Discriminant of [`DbError`] used by rollback policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Parse,
    TableExists,
    TableNotFound,
    ColumnNotFound,
    TypeMismatch,
    ConstraintViolation,
    UnsupportedOperation,
    NotFound,
    DuplicateKey,
    PoolExhausted,
    ConnectionClosed,
    AuthenticationFailed,
    LockTimeout,
    InvalidState,
    Overflow,
    ValidationFailed,
    TransferFailed,
    Application,
    Config,
    Lock,
}

impl ErrorKind {
    /// Default answer to "does a unit of work failing with this kind roll back?"
    ///
    /// Every kind rolls back. `Application` errors carry their own flag, see
    /// [`DbError::rolls_back`].
    pub fn rolls_back(self) -> bool {
        true
    }
}

impl DbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ParseError(_) => ErrorKind::Parse,
            Self::TableExists(_) => ErrorKind::TableExists,
            Self::TableNotFound(_) => ErrorKind::TableNotFound,
            Self::ColumnNotFound(..) => ErrorKind::ColumnNotFound,
            Self::TypeMismatch(_) => ErrorKind::TypeMismatch,
            Self::ConstraintViolation(_) => ErrorKind::ConstraintViolation,
            Self::UnsupportedOperation(_) => ErrorKind::UnsupportedOperation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::DuplicateKey { .. } => ErrorKind::DuplicateKey,
            Self::PoolExhausted(_) => ErrorKind::PoolExhausted,
            Self::ConnectionClosed(_) => ErrorKind::ConnectionClosed,
            Self::AuthenticationFailed(_) => ErrorKind::AuthenticationFailed,
            Self::LockTimeout { .. } => ErrorKind::LockTimeout,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::Overflow(_) => ErrorKind::Overflow,
            Self::ValidationFailed(_) => ErrorKind::ValidationFailed,
            Self::TransferFailed { .. } => ErrorKind::TransferFailed,
            Self::Application { .. } => ErrorKind::Application,
            Self::ConfigError(_) => ErrorKind::Config,
            Self::LockError(_) => ErrorKind::Lock,
        }
    }

    /// Whether this error should undo the surrounding transaction when no
    /// policy override applies.
    pub fn rolls_back(&self) -> bool {
        match self {
            Self::Application { rollback, .. } => *rollback,
            other => other.kind().rolls_back(),
        }
    }

    /// Business error that still lets the surrounding transaction commit.
    pub fn committing(message: impl Into<String>) -> Self {
        Self::Application {
            message: message.into(),
            rollback: false,
        }
    }

    /// Business error that undoes the surrounding transaction.
    pub fn aborting(message: impl Into<String>) -> Self {
        Self::Application {
            message: message.into(),
            rollback: true,
        }
    }

    pub fn transfer_failed(source: DbError) -> Self {
        Self::TransferFailed {
            source: Box::new(source),
        }
    }

    pub fn not_found(table: &str, key: impl ToString) -> Self {
        Self::NotFound {
            table: table.to_string(),
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }

    pub fn is_transfer_failed(&self) -> bool {
        matches!(self, Self::TransferFailed { .. })
    }

    /// The wrapped cause of a `TransferFailed`, or `self` otherwise.
    pub fn root_cause(&self) -> &DbError {
        match self {
            Self::TransferFailed { source } => source.root_cause(),
            other => other,
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for DbError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_application_errors_carry_their_own_flag() {
        assert!(!DbError::committing("keep").rolls_back());
        assert!(DbError::aborting("undo").rolls_back());
        assert!(DbError::not_found("member", "A").rolls_back());
    }

    #[test]
    fn test_transfer_failed_keeps_cause() {
        let err = DbError::transfer_failed(DbError::ValidationFailed("sentinel".into()));

        assert!(err.is_transfer_failed());
        assert_eq!(err.kind(), ErrorKind::TransferFailed);
        assert!(matches!(err.root_cause(), DbError::ValidationFailed(_)));
        assert!(err.source().is_some());
    }
}
