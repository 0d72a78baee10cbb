mod common;

use std::time::Duration;

use chrono::{Duration as ChronoDuration, Months, Utc};
use common::{portfolio, service, setup, swap_entry, CHAIN};
use domain::Wallet;
use indexer::{IngestError, PortfolioService};
use tokio::sync::watch;
use uuid::Uuid;
use worker::{
    repositories::{PortfolioStore, SwapRepository},
    services::{refresh_with_retry, RefreshOptions, RetryPolicy},
};

fn wallet(address: &str) -> Wallet {
    Wallet {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        address: address.to_string(),
        name: None,
        chain_id: CHAIN.to_string(),
        chain_token_amount: 0.0,
        value: 0.0,
        favorite: false,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn no_backoff(max_attempts: usize) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        backoff: Duration::ZERO,
    }
}

#[tokio::test]
async fn one_failing_wallet_does_not_stop_the_batch() {
    let (store, source) = setup();
    for address in ["W1", "W2", "W3"] {
        source.set_portfolio(address, portfolio("1", &[("A", 1.0)]));
    }
    source.set_price("A", Some(2.0));
    source.fail("W2");
    let service = service(&store, &source, RefreshOptions::default());

    let summary = service
        .refresh_all(vec![wallet("W1"), wallet("W2"), wallet("W3")])
        .await
        .unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].address, "W2");
    assert!(summary.failures[0].error.contains("503"));

    assert!(store.find_wallet_by_address("W1").await.unwrap().is_some());
    assert!(store.find_wallet_by_address("W2").await.unwrap().is_none());
    assert!(store.find_wallet_by_address("W3").await.unwrap().is_some());
}

#[tokio::test]
async fn batch_errors_only_when_every_wallet_failed() {
    let (store, source) = setup();
    source.fail("W1");
    source.fail("W2");
    let service = service(&store, &source, RefreshOptions::default());

    let err = service
        .refresh_all(vec![wallet("W1"), wallet("W2")])
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Upstream(_)));
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn empty_batch_is_a_no_op() {
    let (store, source) = setup();
    let service = service(&store, &source, RefreshOptions::default());

    let summary = service.refresh_all(Vec::new()).await.unwrap();

    assert_eq!(summary.total, 0);
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn refresh_ingests_swaps_after_reconcile() {
    let (store, source) = setup();
    source.set_portfolio("W1", portfolio("0", &[("BONK", 1.0)]));
    source.set_swaps("W1", vec![swap_entry("h1", "buy", "W1", "BONK", 1.0, 1.0)]);

    let with_swaps = service(&store, &source, RefreshOptions::default());
    with_swaps.refresh_all(vec![wallet("W1")]).await.unwrap();
    assert_eq!(store.count_swaps().await.unwrap(), 1);

    let (store, _) = setup();
    let options = RefreshOptions {
        ingest_swaps: false,
        ..RefreshOptions::default()
    };
    let without_swaps = service(&store, &source, options);
    without_swaps.refresh_all(vec![wallet("W1")]).await.unwrap();
    assert_eq!(store.count_swaps().await.unwrap(), 0);
    assert!(store.find_wallet_by_address("W1").await.unwrap().is_some());
}

#[tokio::test]
async fn single_slot_still_refreshes_every_wallet() {
    let (store, source) = setup();
    let options = RefreshOptions {
        max_concurrency: 0,
        ..RefreshOptions::default()
    };
    let service = service(&store, &source, options);
    let wallets: Vec<Wallet> = (0..5).map(|i| wallet(&format!("W{i}"))).collect();

    let summary = service.refresh_all(wallets).await.unwrap();

    assert_eq!(summary.succeeded, 5);
    assert_eq!(store.list_wallets().await.unwrap().len(), 5);
}

#[tokio::test]
async fn shutdown_skips_wallets_not_yet_started() {
    let (store, source) = setup();
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();
    let service = service(&store, &source, RefreshOptions::default()).with_shutdown(rx);

    let summary = service
        .refresh_all(vec![wallet("W1"), wallet("W2")])
        .await
        .unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.succeeded, 0);
    assert_eq!(source.calls(), 0);
    assert!(store.list_wallets().await.unwrap().is_empty());
}

#[tokio::test]
async fn retry_recovers_from_a_transient_batch_failure() {
    let (store, source) = setup();
    source.set_portfolio("W1", portfolio("0", &[("A", 2.0)]));
    source.set_price("A", Some(1.0));
    source.fail_times("W1", 1);
    let service = service(&store, &source, RefreshOptions::default());

    let summary = refresh_with_retry(&service, vec![wallet("W1")], no_backoff(3), None)
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(source.calls(), 2);
    let stored = store.find_wallet_by_address("W1").await.unwrap().unwrap();
    assert_eq!(stored.value, 2.0);
}

#[tokio::test]
async fn retry_gives_up_after_max_attempts() {
    let (store, source) = setup();
    source.fail("W1");
    let service = service(&store, &source, RefreshOptions::default());

    let err = refresh_with_retry(&service, vec![wallet("W1")], no_backoff(3), None)
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Upstream(_)));
    assert_eq!(source.calls(), 3);
}

#[tokio::test]
async fn shutdown_during_backoff_stops_retrying() {
    let (store, source) = setup();
    source.fail("W1");
    let service = service(&store, &source, RefreshOptions::default());
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();
    let policy = RetryPolicy {
        max_attempts: 3,
        backoff: Duration::from_secs(60),
    };

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        refresh_with_retry(&service, vec![wallet("W1")], policy, Some(rx)),
    )
    .await
    .expect("backoff should end on shutdown")
    .unwrap_err();

    assert!(matches!(err, IngestError::Upstream(_)));
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn partial_failure_is_not_retried() {
    let (store, source) = setup();
    source.fail("W2");
    let service = service(&store, &source, RefreshOptions::default());

    let summary = refresh_with_retry(
        &service,
        vec![wallet("W1"), wallet("W2")],
        no_backoff(3),
        None,
    )
    .await
    .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn overview_compares_against_reference_day_snapshots() {
    let (store, source) = setup();
    source.set_portfolio("W1", portfolio("0", &[("A", 10.0)]));
    source.set_portfolio("W2", portfolio("0", &[("A", 5.0)]));
    source.set_price("A", Some(2.0));
    let service = service(&store, &source, RefreshOptions::default());
    let user_id = Uuid::new_v4();

    let (w1, _) = service
        .reconcile_portfolio(user_id, "W1", CHAIN)
        .await
        .unwrap();
    let (w2, _) = service
        .reconcile_portfolio(user_id, "W2", CHAIN)
        .await
        .unwrap();

    let now = Utc::now();
    let yesterday = now - ChronoDuration::days(1);
    let month_ago = now.checked_sub_months(Months::new(1)).unwrap();
    store.insert_snapshot(w1.id, 10.0, yesterday).await;
    store.insert_snapshot(w2.id, 5.0, yesterday).await;
    store.insert_snapshot(w1.id, 60.0, month_ago).await;

    let overview = service.user_overview(user_id).await.unwrap();

    assert_eq!(overview.total_value, 30.0);
    assert_eq!(overview.wallets.len(), 2);
    assert_eq!(overview.daily_change_pct, Some(100.0));
    assert_eq!(overview.monthly_change_pct, Some(-50.0));
}

#[tokio::test]
async fn overview_without_history_has_no_change() {
    let (store, source) = setup();
    source.set_portfolio("W1", portfolio("0", &[("A", 1.0)]));
    source.set_price("A", Some(4.0));
    let service = service(&store, &source, RefreshOptions::default());
    let user_id = Uuid::new_v4();
    service
        .reconcile_portfolio(user_id, "W1", CHAIN)
        .await
        .unwrap();

    let overview = service.user_overview(user_id).await.unwrap();

    assert_eq!(overview.total_value, 4.0);
    assert_eq!(overview.daily_change_pct, None);
    assert_eq!(overview.monthly_change_pct, None);
}
