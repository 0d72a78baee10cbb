use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use domain::{PnLReport, RefreshSummary, TokenSwap, Wallet, WalletOverview, WalletSnapshot};
use indexer::{IngestError, IngestResult, PortfolioService, RawPortfolio};
use pnl_engine::{calculate_pnl, daily_reference, monthly_reference, percent_change, value_on_day};
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use super::{
    payload::PortfolioPayload,
    reconciler::{build_plan, distinct_mints, PlanInput},
    swaps::swap_records,
    upstream::PortfolioSource,
};
use crate::repositories::{PortfolioStore, StaleHoldingPolicy, SwapRepository, TokenRepository};

#[derive(Debug, Clone, Copy)]
pub struct RefreshOptions {
    pub max_concurrency: usize,
    pub ingest_swaps: bool,
    pub stale_policy: StaleHoldingPolicy,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            ingest_swaps: true,
            stale_policy: StaleHoldingPolicy::Zero,
        }
    }
}

pub struct DbPortfolioService<P>
where
    P: PortfolioSource + 'static,
{
    store: Arc<dyn PortfolioStore>,
    tokens: Arc<dyn TokenRepository>,
    swaps: Arc<dyn SwapRepository>,
    source: Arc<P>,
    pub(super) options: RefreshOptions,
    pub(super) shutdown: Option<watch::Receiver<bool>>,
}

impl<P> Clone for DbPortfolioService<P>
where
    P: PortfolioSource + 'static,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            tokens: self.tokens.clone(),
            swaps: self.swaps.clone(),
            source: self.source.clone(),
            options: self.options,
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<P> DbPortfolioService<P>
where
    P: PortfolioSource + 'static,
{
    pub fn new(
        store: Arc<dyn PortfolioStore>,
        tokens: Arc<dyn TokenRepository>,
        swaps: Arc<dyn SwapRepository>,
        source: Arc<P>,
        options: RefreshOptions,
    ) -> Self {
        Self {
            store,
            tokens,
            swaps,
            source,
            options: RefreshOptions {
                max_concurrency: options.max_concurrency.max(1),
                ..options
            },
            shutdown: None,
        }
    }

    /// Stops dispatching new wallet refreshes once the flag turns `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Portfolio reconciliation, then swap ingestion when enabled.
    pub(super) async fn refresh_wallet(&self, wallet: &Wallet) -> IngestResult<()> {
        self.reconcile_portfolio(wallet.user_id, &wallet.address, &wallet.chain_id)
            .await?;
        if self.options.ingest_swaps {
            self.ingest_swaps(&wallet.address, &wallet.chain_id).await?;
        }
        Ok(())
    }

    /// Sum of each wallet's reference-day snapshot; wallets without one add 0.
    fn past_total(histories: &[Vec<WalletSnapshot>], day: Option<NaiveDate>) -> Option<f64> {
        let day = day?;
        Some(
            histories
                .iter()
                .filter_map(|history| value_on_day(history, day))
                .sum(),
        )
    }
}

#[async_trait]
impl<P> PortfolioService for DbPortfolioService<P>
where
    P: PortfolioSource + 'static,
{
    async fn reconcile_portfolio(
        &self,
        user_id: Uuid,
        wallet_address: &str,
        chain_id: &str,
    ) -> IngestResult<(Wallet, RawPortfolio)> {
        let raw = self.source.fetch_portfolio(wallet_address).await?;
        let payload = PortfolioPayload::from_raw(&raw)?;
        let mints = distinct_mints(&payload);
        let prices = self.source.fetch_prices(&mints).await?;

        let plan = build_plan(PlanInput {
            user_id,
            address: wallet_address,
            chain_id,
            payload: &payload,
            prices: &prices,
            stale_policy: self.options.stale_policy,
            recorded_at: Utc::now(),
        });
        let wallet = self.store.apply_reconciliation(&plan).await?;

        info!(
            wallet_id = %wallet.id,
            wallet = %wallet.address,
            holdings = plan.holdings.len(),
            value = wallet.value,
            "portfolio reconciled"
        );
        Ok((wallet, raw))
    }

    async fn ingest_swaps(
        &self,
        wallet_address: &str,
        chain_id: &str,
    ) -> IngestResult<Vec<TokenSwap>> {
        let wallet = self
            .store
            .find_wallet_by_address(wallet_address)
            .await?
            .ok_or_else(|| IngestError::not_found("wallet", wallet_address))?;

        let entries = self.source.fetch_swaps(wallet_address).await?;
        if entries.is_empty() {
            return Ok(Vec::new());
        }
        let received = entries.len();
        let records = swap_records(entries, &wallet, chain_id);
        let stored = self.swaps.upsert_swaps(&records).await?;

        info!(
            wallet_id = %wallet.id,
            wallet = %wallet.address,
            received,
            stored = stored.len(),
            "swaps ingested"
        );
        Ok(stored)
    }

    async fn token_pnl(&self, mint: &str) -> IngestResult<PnLReport> {
        let token = self
            .tokens
            .find_by_mint(mint)
            .await?
            .ok_or_else(|| IngestError::not_found("token", mint))?;
        let swaps = self.swaps.swaps_for_token(token.id).await?;
        Ok(calculate_pnl(&swaps, token.current_price))
    }

    async fn user_overview(&self, user_id: Uuid) -> IngestResult<WalletOverview> {
        let wallets = self.store.list_wallets_by_user(user_id).await?;
        let now = Utc::now();
        // covers the longest month plus the reference day itself
        let since = now - ChronoDuration::days(32);

        let mut histories = Vec::with_capacity(wallets.len());
        for wallet in &wallets {
            histories.push(self.store.snapshots_for_wallet(wallet.id, since).await?);
        }

        let total_value: f64 = wallets.iter().map(|w| w.value).sum();
        let daily = Self::past_total(&histories, Some(daily_reference(now)));
        let monthly = Self::past_total(&histories, monthly_reference(now));

        Ok(WalletOverview {
            user_id,
            total_value,
            daily_change_pct: daily.and_then(|past| percent_change(total_value, past)),
            monthly_change_pct: monthly.and_then(|past| percent_change(total_value, past)),
            wallets,
        })
    }

    async fn refresh_all(&self, wallets: Vec<Wallet>) -> IngestResult<RefreshSummary> {
        self.refresh_wallets(wallets).await
    }
}
