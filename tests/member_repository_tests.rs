/// Member repository tests
///
/// CRUD against the pooled and the unpooled repository.
/// Run with: cargo test --test member_repository_tests
mod test_utils;

use membertx::{
    Database, DbError, DriverManagerMemberRepository, Member, MemberRepository, Value,
    create_member_table,
};
use test_utils::*;

#[tokio::test]
async fn test_save_and_find() {
    let repository = empty_repository(test_config()).await;

    let saved = repository.save(&Member::new("memberV0", 10_000)).await.unwrap();
    let found = repository.find_by_id("memberV0").await.unwrap();

    assert_eq!(found, saved);
}

#[tokio::test]
async fn test_update() {
    let repository = seeded_repository(test_config(), &[MEMBER_A]).await;

    repository.update(MEMBER_A, 20_000).await.unwrap();

    assert_eq!(balance(&repository, MEMBER_A).await, 20_000);
}

#[tokio::test]
async fn test_delete_then_find_is_not_found() {
    let repository = seeded_repository(test_config(), &[MEMBER_A]).await;

    repository.delete(MEMBER_A).await.unwrap();

    let err = repository.find_by_id(MEMBER_A).await.unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");
}

#[tokio::test]
async fn test_unknown_id_is_not_found() {
    let repository = empty_repository(test_config()).await;

    assert!(matches!(
        repository.find_by_id("nobody").await,
        Err(DbError::NotFound { .. })
    ));
    assert!(repository.update("nobody", 1).await.unwrap_err().is_not_found());
    assert!(repository.delete("nobody").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_duplicate_save_keeps_first_row() {
    let repository = seeded_repository(test_config(), &[MEMBER_A]).await;

    let err = repository
        .save(&Member::new(MEMBER_A, 1))
        .await
        .unwrap_err();

    assert!(err.is_duplicate_key());
    assert_eq!(balance(&repository, MEMBER_A).await, OPENING_BALANCE);
}

#[tokio::test]
async fn test_create_table_is_idempotent_and_returns_connection() {
    let repository = seeded_repository(test_config(), &[MEMBER_A]).await;

    repository.create_table().await.unwrap();

    assert_eq!(balance(&repository, MEMBER_A).await, OPENING_BALANCE);
    let stats = repository.pool().stats();
    assert_eq!(stats.checkouts, stats.checkins);
    assert_eq!(stats.active_connections, 0);
}

#[tokio::test]
async fn test_create_table_reports_exhausted_pool() {
    let config = test_config()
        .max_connections(1)
        .connect_timeout(std::time::Duration::from_millis(50));
    let repository = empty_repository(config).await;

    let held = repository.pool().get_connection().await.unwrap();
    assert!(matches!(
        repository.create_table().await,
        Err(DbError::PoolExhausted(_))
    ));
    held.release().unwrap();

    repository.create_table().await.unwrap();
}

#[tokio::test]
async fn test_repository_calls_return_connections() {
    let repository = seeded_repository(test_config(), &[MEMBER_A]).await;

    repository.find_by_id(MEMBER_A).await.unwrap();
    let _ = repository.find_by_id("nobody").await;
    let _ = repository.save(&Member::new(MEMBER_A, 1)).await;

    let stats = repository.pool().stats();
    assert_eq!(stats.checkouts, stats.checkins);
    assert_eq!(stats.active_connections, 0);
}

#[tokio::test]
async fn test_handle_calls_see_uncommitted_writes() {
    let repository = seeded_repository(test_config(), &[MEMBER_A]).await;
    let mut conn = repository.pool().get_connection().await.unwrap();

    conn.set_auto_commit(false).unwrap();
    repository.update_in(&mut conn, MEMBER_A, 1).await.unwrap();

    let inside = repository.find_by_id_in(&mut conn, MEMBER_A).await.unwrap();
    assert_eq!(inside.money, 1);

    // Other connections still see the committed balance
    assert_eq!(balance(&repository, MEMBER_A).await, OPENING_BALANCE);

    conn.rollback().unwrap();
    conn.release().unwrap();
    assert_eq!(balance(&repository, MEMBER_A).await, OPENING_BALANCE);
}

#[tokio::test]
async fn test_driver_manager_repository() {
    let db = Database::new_isolated().unwrap();
    let mut setup = db.connect("admin", "adminpass").unwrap();
    create_member_table(&mut setup).await.unwrap();

    let repository = DriverManagerMemberRepository::new(db.clone(), "admin", "adminpass");

    repository.save(&Member::new("memberV0", 10_000)).await.unwrap();
    repository.update("memberV0", 20_000).await.unwrap();
    assert_eq!(repository.find_by_id("memberV0").await.unwrap().money, 20_000);

    // Writes are immediately visible to any other connection
    let row = setup
        .query_one(
            "SELECT money FROM member WHERE member_id = ?",
            &[Value::from("memberV0")],
        )
        .await
        .unwrap();
    assert_eq!(row[0], Value::Integer(20_000));

    repository.delete("memberV0").await.unwrap();
    assert!(repository.find_by_id("memberV0").await.unwrap_err().is_not_found());
    assert!(repository.delete("memberV0").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_driver_manager_rejects_bad_credentials() {
    let db = Database::new_isolated().unwrap();
    let repository = DriverManagerMemberRepository::new(db, "admin", "wrong");

    assert!(matches!(
        repository.find_by_id(MEMBER_A).await,
        Err(DbError::AuthenticationFailed(_))
    ));
}
