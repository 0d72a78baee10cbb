use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tokio::sync::watch;

use crate::{
    config::AppConfig,
    repositories::{PostgresPortfolioStore, PostgresSwapRepository, PostgresTokenRepository},
    services::{DbPortfolioService, MoralisPortfolioSource, RefreshOptions},
    state::AppState,
};

pub async fn build_state(
    config: &AppConfig,
    shutdown: Option<watch::Receiver<bool>>,
) -> Result<AppState> {
    let pool = PgPool::connect(&config.database_url)
        .await
        .context("failed to connect to DATABASE_URL")?;
    sqlx::migrate!("../migrations").run(&pool).await?;

    let store = Arc::new(PostgresPortfolioStore::new(pool.clone()));
    let tokens = Arc::new(PostgresTokenRepository::new(pool.clone()));
    let swaps = Arc::new(PostgresSwapRepository::new(pool.clone()));
    let source = Arc::new(MoralisPortfolioSource::new(
        &config.upstream_api_base,
        &config.upstream_api_key,
        &config.upstream_network,
        config.upstream_timeout,
    )?);

    let mut service = DbPortfolioService::new(
        store.clone(),
        tokens.clone(),
        swaps.clone(),
        source,
        RefreshOptions {
            max_concurrency: config.refresh_max_concurrency,
            ingest_swaps: config.refresh_ingest_swaps,
            stale_policy: config.stale_holding_policy,
        },
    );
    if let Some(shutdown) = shutdown {
        service = service.with_shutdown(shutdown);
    }

    tracing::info!(
        api_base = %config.upstream_api_base,
        network = %config.upstream_network,
        stale_policy = %config.stale_holding_policy,
        "worker state ready"
    );

    Ok(AppState {
        config: config.clone(),
        db: pool,
        portfolio: Arc::new(service),
        store,
        tokens,
        swaps,
    })
}
