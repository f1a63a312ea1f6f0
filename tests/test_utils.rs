#![allow(dead_code)]

use membertx::{
    ConnectionConfig, ConnectionPool, Member, MemberRepository, PooledMemberRepository,
};
use std::time::Duration;

pub const MEMBER_A: &str = "memberA";
pub const MEMBER_B: &str = "memberB";
pub const MEMBER_EX: &str = "ex";
pub const OPENING_BALANCE: i64 = 10_000;

pub fn test_config() -> ConnectionConfig {
    ConnectionConfig::new("admin", "adminpass")
        .max_connections(8)
        .connect_timeout(Duration::from_secs(10))
        .lock_timeout(Duration::from_secs(5))
}

/// Isolated database with an empty `member` table.
pub async fn empty_repository(config: ConnectionConfig) -> PooledMemberRepository {
    let pool = ConnectionPool::new_isolated(config).await.unwrap();
    let repository = PooledMemberRepository::new(pool);
    repository.create_table().await.unwrap();
    repository
}

/// Isolated database where every id in `ids` starts with `OPENING_BALANCE`.
pub async fn seeded_repository(config: ConnectionConfig, ids: &[&str]) -> PooledMemberRepository {
    let repository = empty_repository(config).await;
    for id in ids {
        repository
            .save(&Member::new(*id, OPENING_BALANCE))
            .await
            .unwrap();
    }
    repository
}

/// memberA, memberB and the sentinel `ex`, 10000 each.
pub async fn standard_repository() -> PooledMemberRepository {
    seeded_repository(test_config(), &[MEMBER_A, MEMBER_B, MEMBER_EX]).await
}

pub async fn balance(repository: &PooledMemberRepository, id: &str) -> i64 {
    repository.find_by_id(id).await.unwrap().money
}
