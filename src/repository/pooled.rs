use super::{
    DELETE_MEMBER, INSERT_MEMBER, create_member_table, MEMBER_TABLE, Member, MemberRepository, SELECT_MEMBER,
    SELECT_MEMBER_FOR_UPDATE, UPDATE_MONEY,
};
use crate::connection::Connection;
use crate::connection::pool::ConnectionPool;
use crate::core::{DbError, Result, Value};
use async_trait::async_trait;
use tracing::debug;

/// Pool-backed member repository.
#[derive(Clone)]
pub struct PooledMemberRepository {
    pool: ConnectionPool,
}

impl PooledMemberRepository {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Creates the `member` table on a pooled connection. The creation
    /// outcome is returned; a failed release is only logged.
    pub async fn create_table(&self) -> Result<()> {
        let mut conn = self.pool.get_connection().await?;
        let result = create_member_table(&mut conn).await;
        conn.release_logged();
        result
    }

    pub async fn save_in(&self, conn: &mut Connection, member: &Member) -> Result<Member> {
        conn.execute(INSERT_MEMBER, &member.params()).await?;
        debug!(member_id = %member.member_id, money = member.money, "member saved");
        Ok(member.clone())
    }

    /// Looks a member up through `conn`. Inside a manual transaction the row
    /// is locked until that transaction ends.
    pub async fn find_by_id_in(&self, conn: &mut Connection, member_id: &str) -> Result<Member> {
        let sql = if conn.auto_commit() {
            SELECT_MEMBER
        } else {
            SELECT_MEMBER_FOR_UPDATE
        };

        let row = conn
            .query_one(sql, &[Value::from(member_id)])
            .await
            .map_err(|e| match e {
                DbError::NotFound { .. } => DbError::not_found(MEMBER_TABLE, member_id),
                other => other,
            })?;
        Member::from_row(&row)
    }

    pub async fn update_in(&self, conn: &mut Connection, member_id: &str, money: i64) -> Result<()> {
        let affected = conn
            .execute(UPDATE_MONEY, &[Value::Integer(money), Value::from(member_id)])
            .await?;
        if affected == 0 {
            return Err(DbError::not_found(MEMBER_TABLE, member_id));
        }
        debug!(member_id, money, "member balance updated");
        Ok(())
    }

    pub async fn delete_in(&self, conn: &mut Connection, member_id: &str) -> Result<()> {
        let affected = conn.execute(DELETE_MEMBER, &[Value::from(member_id)]).await?;
        if affected == 0 {
            return Err(DbError::not_found(MEMBER_TABLE, member_id));
        }
        Ok(())
    }
}

#[async_trait]
impl MemberRepository for PooledMemberRepository {
    async fn save(&self, member: &Member) -> Result<Member> {
        let mut conn = self.pool.get_connection().await?;
        let result = self.save_in(&mut conn, member).await;
        conn.release_logged();
        result
    }

    async fn find_by_id(&self, member_id: &str) -> Result<Member> {
        let mut conn = self.pool.get_connection().await?;
        let result = self.find_by_id_in(&mut conn, member_id).await;
        conn.release_logged();
        result
    }

    async fn update(&self, member_id: &str, money: i64) -> Result<()> {
        let mut conn = self.pool.get_connection().await?;
        let result = self.update_in(&mut conn, member_id, money).await;
        conn.release_logged();
        result
    }

    async fn delete(&self, member_id: &str) -> Result<()> {
        let mut conn = self.pool.get_connection().await?;
        let result = self.delete_in(&mut conn, member_id).await;
        conn.release_logged();
        result
    }
}
