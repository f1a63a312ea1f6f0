/// Transaction template tests
///
/// Managed boundary: the template commits, rolls back per policy, and
/// releases the connection around caller-supplied work.
/// Run with: cargo test --test template_transfer_tests
mod test_utils;

use membertx::{
    DbError, ErrorKind, RollbackPolicy, TemplateTransferService, TransactionTemplate, Value,
};
use test_utils::*;

const SET_MONEY: &str = "UPDATE member SET money = ? WHERE member_id = ?";

#[tokio::test]
async fn test_template_transfer_end_to_end() {
    let repository = standard_repository().await;
    let service = TemplateTransferService::new(repository.clone());

    service.transfer(MEMBER_A, MEMBER_B, 2_000).await.unwrap();
    assert_eq!(balance(&repository, MEMBER_A).await, 8_000);
    assert_eq!(balance(&repository, MEMBER_B).await, 12_000);

    let err = service.transfer(MEMBER_A, MEMBER_EX, 2_000).await.unwrap_err();
    assert!(err.is_transfer_failed());
    assert_eq!(balance(&repository, MEMBER_A).await, 8_000);

    let stats = repository.pool().stats();
    assert_eq!(stats.checkouts, stats.checkins);
}

#[tokio::test]
async fn test_success_commits_and_returns_value() {
    let repository = standard_repository().await;
    let template = TransactionTemplate::new(repository.pool().clone());

    let affected = template
        .execute(|conn| {
            Box::pin(async move {
                conn.execute(SET_MONEY, &[Value::Integer(1), Value::from(MEMBER_A)])
                    .await
            })
        })
        .await
        .unwrap();

    assert_eq!(affected, 1);
    assert_eq!(balance(&repository, MEMBER_A).await, 1);
}

#[tokio::test]
async fn test_error_rolls_back_by_default() {
    let repository = standard_repository().await;
    let template = TransactionTemplate::new(repository.pool().clone());

    let result = template
        .execute(|conn| {
            Box::pin(async move {
                conn.execute(SET_MONEY, &[Value::Integer(1), Value::from(MEMBER_A)])
                    .await?;
                Err::<(), DbError>(DbError::aborting("business rule broken"))
            })
        })
        .await;

    assert!(matches!(result, Err(DbError::Application { rollback: true, .. })));
    assert_eq!(balance(&repository, MEMBER_A).await, OPENING_BALANCE);
}

#[tokio::test]
async fn test_committing_error_keeps_work() {
    let repository = standard_repository().await;
    let template = TransactionTemplate::new(repository.pool().clone());

    let result = template
        .execute(|conn| {
            Box::pin(async move {
                conn.execute(SET_MONEY, &[Value::Integer(1), Value::from(MEMBER_A)])
                    .await?;
                Err::<(), DbError>(DbError::committing("recorded, but report it"))
            })
        })
        .await;

    // The caller still sees the error, yet the update was committed
    assert!(matches!(result, Err(DbError::Application { rollback: false, .. })));
    assert_eq!(balance(&repository, MEMBER_A).await, 1);
}

#[tokio::test]
async fn test_policy_override_commits_on_kind() {
    let repository = standard_repository().await;
    let policy = RollbackPolicy::new().commit_on(ErrorKind::NotFound);
    let template = TransactionTemplate::with_policy(repository.pool().clone(), policy);
    let repo = repository.clone();

    let result = template
        .execute(move |conn| {
            Box::pin(async move {
                repo.update_in(conn, MEMBER_A, 5).await?;
                repo.find_by_id_in(conn, "ghost").await.map(|_| ())
            })
        })
        .await;

    assert!(result.unwrap_err().is_not_found());
    assert_eq!(balance(&repository, MEMBER_A).await, 5);
}

#[tokio::test]
async fn test_policy_override_rolls_back_committing_error() {
    let repository = standard_repository().await;
    let policy = RollbackPolicy::new().rollback_on(ErrorKind::Application);
    let template = TransactionTemplate::with_policy(repository.pool().clone(), policy);

    let result = template
        .execute(|conn| {
            Box::pin(async move {
                conn.execute(SET_MONEY, &[Value::Integer(1), Value::from(MEMBER_A)])
                    .await?;
                Err::<(), DbError>(DbError::committing("overridden"))
            })
        })
        .await;

    assert!(result.is_err());
    assert_eq!(balance(&repository, MEMBER_A).await, OPENING_BALANCE);
}

#[tokio::test]
async fn test_statement_error_inside_work_rolls_back_earlier_writes() {
    let repository = standard_repository().await;
    let template = TransactionTemplate::new(repository.pool().clone());

    let result = template
        .execute(|conn| {
            Box::pin(async move {
                conn.execute(SET_MONEY, &[Value::Integer(1), Value::from(MEMBER_A)])
                    .await?;
                conn.execute(
                    "INSERT INTO member (member_id, money) VALUES (?, ?)",
                    &[Value::from(MEMBER_B), Value::Integer(0)],
                )
                .await
            })
        })
        .await;

    assert!(result.unwrap_err().is_duplicate_key());
    assert_eq!(balance(&repository, MEMBER_A).await, OPENING_BALANCE);
    assert_eq!(balance(&repository, MEMBER_B).await, OPENING_BALANCE);

    let stats = repository.pool().stats();
    assert_eq!(stats.checkouts, stats.checkins);
}
