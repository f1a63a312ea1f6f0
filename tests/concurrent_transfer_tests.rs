/// Concurrent transfer tests
///
/// Independent transfers on separate tasks, each with its own connection.
/// Run with: cargo test --test concurrent_transfer_tests
mod test_utils;

use membertx::{TemplateTransferService, TransferService};
use test_utils::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_connections_balance_after_concurrent_transfers() {
    let repository = standard_repository().await;
    let service = TransferService::new(repository.clone());
    let before = repository.pool().stats();

    let mut handles = Vec::new();
    for i in 0..20 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            // Every third transfer targets the sentinel and fails
            let to = if i % 3 == 0 { MEMBER_EX } else { MEMBER_B };
            service.transfer(MEMBER_A, to, 10).await
        }));
    }

    let mut failures = 0;
    for handle in handles {
        if handle.await.unwrap().is_err() {
            failures += 1;
        }
    }

    let after = repository.pool().stats();
    assert_eq!(failures, 7);
    assert_eq!(after.checkouts - before.checkouts, 20);
    assert_eq!(after.checkouts, after.checkins);
    assert_eq!(after.active_connections, 0);
    assert!(after.total_connections <= after.max_connections);

    assert_eq!(balance(&repository, MEMBER_A).await, OPENING_BALANCE - 13 * 10);
    assert_eq!(balance(&repository, MEMBER_B).await, OPENING_BALANCE + 13 * 10);
    assert_eq!(balance(&repository, MEMBER_EX).await, OPENING_BALANCE);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_account_transfers_do_not_lose_updates() {
    let repository = seeded_repository(test_config().max_connections(4), &[MEMBER_A, MEMBER_B]).await;
    let service = TransferService::new(repository.clone());

    let mut handles = Vec::new();
    for _ in 0..25 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.transfer(MEMBER_A, MEMBER_B, 100).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(balance(&repository, MEMBER_A).await, 7_500);
    assert_eq!(balance(&repository, MEMBER_B).await, 12_500);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposite_transfers_do_not_deadlock() {
    let repository = seeded_repository(test_config(), &[MEMBER_A, MEMBER_B]).await;
    let service = TransferService::new(repository.clone());

    let mut handles = Vec::new();
    for i in 0..20 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                service.transfer(MEMBER_A, MEMBER_B, 50).await
            } else {
                service.transfer(MEMBER_B, MEMBER_A, 30).await
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(balance(&repository, MEMBER_A).await, OPENING_BALANCE - 10 * 50 + 10 * 30);
    assert_eq!(balance(&repository, MEMBER_B).await, OPENING_BALANCE + 10 * 50 - 10 * 30);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_disjoint_pairs_complete_independently() {
    let ids: Vec<String> = (0..16).map(|i| format!("member{:02}", i)).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let repository = seeded_repository(test_config(), &id_refs).await;
    let service = TemplateTransferService::new(repository.clone());

    let mut handles = Vec::new();
    for pair in ids.chunks(2) {
        let service = service.clone();
        let (from, to) = (pair[0].clone(), pair[1].clone());
        handles.push(tokio::spawn(async move {
            service.transfer(&from, &to, 1_000).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for pair in ids.chunks(2) {
        assert_eq!(balance(&repository, &pair[0]).await, 9_000);
        assert_eq!(balance(&repository, &pair[1]).await, 11_000);
    }

    let stats = repository.pool().stats();
    assert_eq!(stats.checkouts, stats.checkins);
}
