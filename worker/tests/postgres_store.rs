mod common;

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use common::{portfolio, swap_entry, StubSource, CHAIN};
use domain::NewToken;
use indexer::PortfolioService;
use sqlx::PgPool;
use uuid::Uuid;
use worker::{
    repositories::{
        PortfolioStore, PostgresPortfolioStore, PostgresSwapRepository, PostgresTokenRepository,
        StaleHoldingPolicy, SwapRepository, TokenRepository,
    },
    services::{DbPortfolioService, RefreshOptions},
};

struct Harness {
    store: Arc<PostgresPortfolioStore>,
    tokens: Arc<PostgresTokenRepository>,
    swaps: Arc<PostgresSwapRepository>,
    source: Arc<StubSource>,
}

impl Harness {
    fn new(pool: &PgPool) -> Self {
        Self {
            store: Arc::new(PostgresPortfolioStore::new(pool.clone())),
            tokens: Arc::new(PostgresTokenRepository::new(pool.clone())),
            swaps: Arc::new(PostgresSwapRepository::new(pool.clone())),
            source: Arc::new(StubSource::default()),
        }
    }

    fn service(&self, options: RefreshOptions) -> DbPortfolioService<StubSource> {
        DbPortfolioService::new(
            self.store.clone(),
            self.tokens.clone(),
            self.swaps.clone(),
            self.source.clone(),
            options,
        )
    }
}

async fn count(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .expect("count rows")
}

#[sqlx::test(migrations = "../migrations")]
async fn reconcile_is_idempotent_in_postgres(pool: PgPool) {
    let harness = Harness::new(&pool);
    harness
        .source
        .set_portfolio("W1", portfolio("1.5", &[("A", 10.0), ("B", 4.0)]));
    harness.source.set_price("A", Some(2.0));
    harness.source.set_price("B", None);
    let service = harness.service(RefreshOptions::default());
    let user_id = Uuid::new_v4();

    let (first, _) = service
        .reconcile_portfolio(user_id, "W1", CHAIN)
        .await
        .expect("first reconcile");
    let (second, _) = service
        .reconcile_portfolio(user_id, "W1", CHAIN)
        .await
        .expect("second reconcile");

    assert_eq!(first.id, second.id);
    assert_eq!(second.value, 20.0);
    assert_eq!(second.chain_token_amount, 1.5);
    assert_eq!(count(&pool, "wallets").await, 1);
    assert_eq!(count(&pool, "tokens").await, 2);
    assert_eq!(count(&pool, "token_holdings").await, 2);
    assert_eq!(count(&pool, "wallet_snapshots").await, 2);

    let since = Utc::now() - ChronoDuration::days(1);
    let snapshots = harness
        .store
        .snapshots_for_wallet(first.id, since)
        .await
        .expect("snapshots");
    assert!(snapshots.iter().all(|s| s.value == 20.0));
}

#[sqlx::test(migrations = "../migrations")]
async fn reconcile_keeps_user_owned_fields(pool: PgPool) {
    let harness = Harness::new(&pool);
    harness.source.set_portfolio("W1", portfolio("0", &[("A", 1.0)]));
    harness.source.set_price("A", Some(1.0));
    let service = harness.service(RefreshOptions::default());

    let (wallet, _) = service
        .reconcile_portfolio(Uuid::new_v4(), "W1", CHAIN)
        .await
        .expect("reconcile");
    sqlx::query("UPDATE wallets SET name = 'Cold storage', favorite = TRUE WHERE id = $1")
        .bind(wallet.id)
        .execute(&pool)
        .await
        .expect("rename wallet");

    let (again, _) = service
        .reconcile_portfolio(wallet.user_id, "W1", CHAIN)
        .await
        .expect("reconcile again");

    assert_eq!(again.name.as_deref(), Some("Cold storage"));
    assert!(again.favorite);
}

#[sqlx::test(migrations = "../migrations")]
async fn stale_holdings_follow_policy(pool: PgPool) {
    let harness = Harness::new(&pool);
    harness
        .source
        .set_portfolio("W1", portfolio("0", &[("A", 1.0), ("B", 1.0)]));
    harness
        .source
        .set_portfolio("W2", portfolio("0", &[("A", 1.0), ("B", 1.0)]));
    harness.source.set_price("A", Some(1.0));
    harness.source.set_price("B", Some(1.0));

    let zero = harness.service(RefreshOptions::default());
    let delete = harness.service(RefreshOptions {
        stale_policy: StaleHoldingPolicy::Delete,
        ..RefreshOptions::default()
    });
    let user_id = Uuid::new_v4();
    zero.reconcile_portfolio(user_id, "W1", CHAIN).await.expect("W1");
    delete.reconcile_portfolio(user_id, "W2", CHAIN).await.expect("W2");

    harness.source.set_portfolio("W1", portfolio("0", &[("A", 1.0)]));
    harness.source.set_portfolio("W2", portfolio("0", &[("A", 1.0)]));
    let (w1, _) = zero.reconcile_portfolio(user_id, "W1", CHAIN).await.expect("W1");
    let (w2, _) = delete.reconcile_portfolio(user_id, "W2", CHAIN).await.expect("W2");

    let w1_holdings = harness.store.holdings_for_wallet(w1.id).await.expect("W1 holdings");
    assert_eq!(w1_holdings.len(), 2);
    assert_eq!(w1_holdings.iter().filter(|h| h.amount == 0.0).count(), 1);
    assert_eq!(w1.value, 1.0);

    let w2_holdings = harness.store.holdings_for_wallet(w2.id).await.expect("W2 holdings");
    assert_eq!(w2_holdings.len(), 1);
    assert_eq!(w2.value, 1.0);
}

#[sqlx::test(migrations = "../migrations")]
async fn swaps_upsert_by_hash(pool: PgPool) {
    let harness = Harness::new(&pool);
    harness.source.set_portfolio("W1", portfolio("0", &[("BONK", 15.0)]));
    harness.source.set_price("BONK", Some(5.0));
    harness.source.set_swaps(
        "W1",
        vec![
            swap_entry("h3", "sell", "W1", "BONK", 5.0, 4.0),
            swap_entry("h2", "buy", "W1", "BONK", 10.0, 3.0),
            swap_entry("h1", "buy", "W1", "BONK", 10.0, 1.0),
        ],
    );
    let service = harness.service(RefreshOptions::default());
    let (wallet, _) = service
        .reconcile_portfolio(Uuid::new_v4(), "W1", CHAIN)
        .await
        .expect("reconcile");

    let first = service.ingest_swaps("W1", CHAIN).await.expect("first ingest");
    let second = service.ingest_swaps("W1", CHAIN).await.expect("second ingest");

    assert_eq!(first.len(), 3);
    assert_eq!(
        first.iter().map(|s| s.id).collect::<Vec<_>>(),
        second.iter().map(|s| s.id).collect::<Vec<_>>()
    );
    assert_eq!(harness.swaps.count_swaps().await.expect("count"), 3);

    let history = harness
        .swaps
        .swaps_for_wallet(wallet.id)
        .await
        .expect("wallet swaps");
    assert_eq!(history.len(), 3);
    assert!(history.iter().all(|s| s.base_token == "BONK"));

    let report = service.token_pnl("BONK").await.expect("pnl");
    assert_eq!(report.average_buy_price, 2.0);
    assert_eq!(report.realized_pnl, 10.0);
    assert_eq!(report.unrealized_pnl, 45.0);
}

#[sqlx::test(migrations = "../migrations")]
async fn missing_price_does_not_clobber_stored_price(pool: PgPool) {
    let harness = Harness::new(&pool);
    harness.source.set_portfolio("W1", portfolio("0", &[("A", 10.0)]));
    harness.source.set_portfolio("W2", portfolio("0", &[("A", 3.0)]));
    harness.source.set_price("A", Some(2.0));
    let service = harness.service(RefreshOptions::default());
    let user_id = Uuid::new_v4();
    service
        .reconcile_portfolio(user_id, "W1", CHAIN)
        .await
        .expect("W1");

    harness.source.clear_price("A");
    let (w2, _) = service
        .reconcile_portfolio(user_id, "W2", CHAIN)
        .await
        .expect("W2");

    assert_eq!(w2.value, 0.0);
    let token = harness.tokens.find_by_mint("A").await.expect("find").expect("token");
    assert_eq!(token.current_price, 2.0);
}

#[sqlx::test(migrations = "../migrations")]
async fn reconcile_and_swap_ingest_share_token_lock_order(pool: PgPool) {
    let harness = Harness::new(&pool);
    harness.source.set_portfolio("W2", portfolio("0", &[]));
    let service = harness.service(RefreshOptions::default());
    let user_id = Uuid::new_v4();
    service
        .reconcile_portfolio(user_id, "W2", CHAIN)
        .await
        .expect("W2");

    for round in 0..50 {
        let a = format!("A{round:04}");
        let b = format!("B{round:04}");
        harness
            .source
            .set_portfolio("W1", portfolio("0", &[(a.as_str(), 1.0), (b.as_str(), 1.0)]));
        harness.source.set_swaps(
            "W2",
            vec![
                swap_entry(&format!("b{round}"), "buy", "W2", &b, 1.0, 1.0),
                swap_entry(&format!("a{round}"), "buy", "W2", &a, 1.0, 1.0),
            ],
        );

        let (reconciled, ingested) = tokio::join!(
            service.reconcile_portfolio(user_id, "W1", CHAIN),
            service.ingest_swaps("W2", CHAIN),
        );
        reconciled.unwrap_or_else(|err| panic!("round {round} reconcile: {err}"));
        ingested.unwrap_or_else(|err| panic!("round {round} ingest: {err}"));
    }

    assert_eq!(count(&pool, "tokens").await, 100);
    assert_eq!(harness.swaps.count_swaps().await.expect("count"), 100);
}

#[sqlx::test(migrations = "../migrations")]
async fn concurrent_token_inserts_resolve_to_one_row(pool: PgPool) {
    let repo = Arc::new(PostgresTokenRepository::new(pool.clone()));
    let token = NewToken {
        chain_id: CHAIN.to_string(),
        name: "Bonk".to_string(),
        symbol: "BONK".to_string(),
        logo: None,
        address: "BONK".to_string(),
        mint: "BONK".to_string(),
        current_price: 0.00002,
    };

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let repo = repo.clone();
            let token = token.clone();
            tokio::spawn(async move { repo.ensure_token(&token).await })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.expect("join").expect("ensure token").id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(count(&pool, "tokens").await, 1);

    let found = repo.find_by_mint("BONK").await.expect("find").expect("token");
    assert_eq!(found.id, ids[0]);
}
