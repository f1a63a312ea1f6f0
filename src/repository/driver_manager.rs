use super::{
    DELETE_MEMBER, INSERT_MEMBER, MEMBER_TABLE, Member, MemberRepository, SELECT_MEMBER,
    UPDATE_MONEY,
};
use crate::connection::Connection;
use crate::connection::config::ConnectionConfig;
use crate::core::{DbError, Result, Value};
use crate::facade::Database;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Member repository without pooling: every call opens its own connection,
/// runs one auto-commit statement and closes it.
///
/// Calls never share a transaction, so a sequence of them is not atomic.
pub struct DriverManagerMemberRepository {
    db: Database,
    username: String,
    password: String,
}

impl DriverManagerMemberRepository {
    pub fn new(db: Database, username: &str, password: &str) -> Self {
        Self {
            db,
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    /// Locates the registered database named in `config`.
    pub fn from_config(config: &ConnectionConfig) -> Result<Self> {
        config.validate().map_err(DbError::ConfigError)?;
        let db = Database::open_named(&config.database)?;
        Ok(Self::new(db, &config.username, &config.password))
    }

    fn open(&self) -> Result<Connection> {
        let conn = self.db.connect(&self.username, &self.password)?;
        debug!(connection = conn.id(), "opened unpooled connection");
        Ok(conn)
    }

    fn close(mut conn: Connection) {
        if let Err(e) = conn.close() {
            warn!(connection = conn.id(), error = %e, "failed to close connection");
        }
    }
}

#[async_trait]
impl MemberRepository for DriverManagerMemberRepository {
    async fn save(&self, member: &Member) -> Result<Member> {
        let mut conn = self.open()?;
        let result = conn.execute(INSERT_MEMBER, &member.params()).await;
        Self::close(conn);
        result.map(|_| member.clone())
    }

    async fn find_by_id(&self, member_id: &str) -> Result<Member> {
        let mut conn = self.open()?;
        let result = conn.query_one(SELECT_MEMBER, &[Value::from(member_id)]).await;
        Self::close(conn);

        match result {
            Ok(row) => Member::from_row(&row),
            Err(DbError::NotFound { .. }) => Err(DbError::not_found(MEMBER_TABLE, member_id)),
            Err(e) => Err(e),
        }
    }

    async fn update(&self, member_id: &str, money: i64) -> Result<()> {
        let mut conn = self.open()?;
        let result = conn
            .execute(UPDATE_MONEY, &[Value::Integer(money), Value::from(member_id)])
            .await;
        Self::close(conn);

        match result? {
            0 => Err(DbError::not_found(MEMBER_TABLE, member_id)),
            _ => Ok(()),
        }
    }

    async fn delete(&self, member_id: &str) -> Result<()> {
        let mut conn = self.open()?;
        let result = conn.execute(DELETE_MEMBER, &[Value::from(member_id)]).await;
        Self::close(conn);

        match result? {
            0 => Err(DbError::not_found(MEMBER_TABLE, member_id)),
            _ => Ok(()),
        }
    }
}
