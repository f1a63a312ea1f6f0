// ============================================================================
// membertx Library
// ============================================================================
//
// Member balance transfers over an in-process transactional store:
// pooled connections with explicit commit/rollback, a member repository,
// and transfer services with manual and template-managed boundaries.
//
// ============================================================================

pub mod connection;
pub mod core;
pub mod facade;
pub mod repository;
pub mod result;
pub mod service;
pub mod storage;
pub mod transaction;
mod executor;
mod parser;

// Re-export main types for convenience
pub use core::{DataType, DbError, ErrorKind, Result, Row, Value};
pub use facade::Database;
pub use result::QueryResult;

// Re-export connection API
pub use connection::{
    Connection,
    auth::{AuthManager, User},
    config::ConnectionConfig,
    pool::{ConnectionPool, PoolGuard, PoolStats},
};
pub use transaction::HandleState;

// Re-export the member-transfer API
pub use repository::{
    DriverManagerMemberRepository, Member, MemberRepository, PooledMemberRepository,
    create_member_table,
};
pub use service::{
    RollbackPolicy, TemplateTransferService, TransactionTemplate, TransferConfig,
    TransferRequest, TransferService,
};
