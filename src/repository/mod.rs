// ============================================================================
// Member Repository
// ============================================================================
//
// Data access for `member (member_id TEXT PRIMARY KEY, money INTEGER)`.
//
// - `PooledMemberRepository`: pool-backed. The plain methods check out a
//   connection per call; the `*_in` methods run on a caller's connection so
//   several calls share one transaction.
// - `DriverManagerMemberRepository`: opens a fresh connection per call.
//
// ============================================================================

mod driver_manager;
mod member;
mod pooled;

pub use driver_manager::DriverManagerMemberRepository;
pub use member::Member;
pub use pooled::PooledMemberRepository;

use crate::connection::Connection;
use crate::core::Result;
use async_trait::async_trait;

pub const MEMBER_TABLE: &str = "member";

pub(crate) const CREATE_MEMBER_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS member (member_id TEXT PRIMARY KEY, money INTEGER NOT NULL)";
pub(crate) const INSERT_MEMBER: &str = "INSERT INTO member (member_id, money) VALUES (?, ?)";
pub(crate) const SELECT_MEMBER: &str = "SELECT member_id, money FROM member WHERE member_id = ?";
pub(crate) const SELECT_MEMBER_FOR_UPDATE: &str =
    "SELECT member_id, money FROM member WHERE member_id = ? FOR UPDATE";
pub(crate) const UPDATE_MONEY: &str = "UPDATE member SET money = ? WHERE member_id = ?";
pub(crate) const DELETE_MEMBER: &str = "DELETE FROM member WHERE member_id = ?";

/// Account store operations.
///
/// Every method runs as its own unit of work. Lookups of unknown ids, and
/// updates or deletes that touch no row, fail with `NotFound`.
#[async_trait]
pub trait MemberRepository: Send + Sync {
    async fn save(&self, member: &Member) -> Result<Member>;

    async fn find_by_id(&self, member_id: &str) -> Result<Member>;

    async fn update(&self, member_id: &str, money: i64) -> Result<()>;

    async fn delete(&self, member_id: &str) -> Result<()>;
}

/// Creates the `member` table if it does not exist yet.
pub async fn create_member_table(conn: &mut Connection) -> Result<()> {
    conn.execute(CREATE_MEMBER_TABLE, &[]).await?;
    Ok(())
}
