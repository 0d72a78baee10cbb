use std::{fmt, str::FromStr};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{NewToken, TokenHolding, Wallet, WalletSnapshot, DEFAULT_WALLET_NAME};
use sqlx::{postgres::PgRow, PgPool, Row};
use thiserror::Error;
use uuid::Uuid;

use super::token_repository::upsert_token_price;

/// What happens to a holding whose token is missing from the latest portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StaleHoldingPolicy {
    /// Keep the row with amount and value set to 0.
    #[default]
    Zero,
    Delete,
}

impl StaleHoldingPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            StaleHoldingPolicy::Zero => "zero",
            StaleHoldingPolicy::Delete => "delete",
        }
    }
}

impl fmt::Display for StaleHoldingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown stale holding policy `{0}`")]
pub struct UnknownPolicy(String);

impl FromStr for StaleHoldingPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zero" => Ok(StaleHoldingPolicy::Zero),
            "delete" => Ok(StaleHoldingPolicy::Delete),
            _ => Err(UnknownPolicy(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WalletUpsert {
    pub user_id: Uuid,
    pub address: String,
    pub chain_id: String,
    pub chain_token_amount: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HoldingUpsert {
    pub token: NewToken,
    /// Price fetched this refresh; `None` leaves the shared token's last price in place.
    pub fetched_price: Option<f64>,
    pub amount: f64,
    pub value: f64,
}

/// Everything one portfolio refresh writes for a wallet.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationPlan {
    pub wallet: WalletUpsert,
    /// One entry per mint, sorted by mint.
    pub holdings: Vec<HoldingUpsert>,
    pub total_value: f64,
    pub stale_policy: StaleHoldingPolicy,
    pub recorded_at: DateTime<Utc>,
}

#[async_trait]
pub trait PortfolioStore: Send + Sync {
    /// Applies the plan atomically and returns the wallet as stored afterwards.
    async fn apply_reconciliation(&self, plan: &ReconciliationPlan) -> Result<Wallet>;
    async fn find_wallet_by_address(&self, address: &str) -> Result<Option<Wallet>>;
    async fn list_wallets(&self) -> Result<Vec<Wallet>>;
    async fn list_wallets_by_user(&self, user_id: Uuid) -> Result<Vec<Wallet>>;
    async fn holdings_for_wallet(&self, wallet_id: Uuid) -> Result<Vec<TokenHolding>>;
    async fn snapshots_for_wallet(
        &self,
        wallet_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<WalletSnapshot>>;
}

const WALLET_COLUMNS: &str = "id, user_id, address, name, chain_id, chain_token_amount, value, \
                              favorite, created_at, updated_at";

#[derive(Clone)]
pub struct PostgresPortfolioStore {
    pool: PgPool,
}

impl PostgresPortfolioStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_wallet(row: &PgRow) -> Result<Wallet> {
        Ok(Wallet {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            address: row.try_get("address")?,
            name: row.try_get("name")?,
            chain_id: row.try_get("chain_id")?,
            chain_token_amount: row.try_get("chain_token_amount")?,
            value: row.try_get("value")?,
            favorite: row.try_get("favorite")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl PortfolioStore for PostgresPortfolioStore {
    async fn apply_reconciliation(&self, plan: &ReconciliationPlan) -> Result<Wallet> {
        let mut tx = self.pool.begin().await?;

        // name and favorite belong to the user and survive a refresh
        let wallet_id: Uuid = sqlx::query(
            "INSERT INTO wallets (id, user_id, address, name, chain_id, chain_token_amount, value, favorite)
             VALUES ($1, $2, $3, $4, $5, $6, 0, FALSE)
             ON CONFLICT (address) DO UPDATE
             SET chain_token_amount = EXCLUDED.chain_token_amount,
                 chain_id = EXCLUDED.chain_id,
                 user_id = EXCLUDED.user_id,
                 updated_at = NOW()
             RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(plan.wallet.user_id)
        .bind(&plan.wallet.address)
        .bind(DEFAULT_WALLET_NAME)
        .bind(&plan.wallet.chain_id)
        .bind(plan.wallet.chain_token_amount)
        .fetch_one(&mut *tx)
        .await
        .context("upsert wallet")?
        .try_get("id")?;

        let mut token_ids = Vec::with_capacity(plan.holdings.len());
        for holding in &plan.holdings {
            let token = upsert_token_price(&mut tx, &holding.token, holding.fetched_price)
                .await
                .with_context(|| format!("upsert token {}", holding.token.mint))?;
            sqlx::query(
                "INSERT INTO token_holdings (id, user_id, wallet_id, token_id, amount, value)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (wallet_id, token_id) DO UPDATE
                 SET amount = EXCLUDED.amount,
                     value = EXCLUDED.value,
                     user_id = EXCLUDED.user_id,
                     updated_at = NOW()",
            )
            .bind(Uuid::new_v4())
            .bind(plan.wallet.user_id)
            .bind(wallet_id)
            .bind(token.id)
            .bind(holding.amount)
            .bind(holding.value)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("upsert holding {}", holding.token.mint))?;
            token_ids.push(token.id);
        }

        let stale = match plan.stale_policy {
            StaleHoldingPolicy::Zero => {
                sqlx::query(
                    "UPDATE token_holdings SET amount = 0, value = 0, updated_at = NOW()
                     WHERE wallet_id = $1 AND NOT (token_id = ANY($2))
                       AND (amount <> 0 OR value <> 0)",
                )
                .bind(wallet_id)
                .bind(&token_ids)
                .execute(&mut *tx)
                .await
            }
            StaleHoldingPolicy::Delete => {
                sqlx::query(
                    "DELETE FROM token_holdings WHERE wallet_id = $1 AND NOT (token_id = ANY($2))",
                )
                .bind(wallet_id)
                .bind(&token_ids)
                .execute(&mut *tx)
                .await
            }
        }
        .context("apply stale holding policy")?;
        if stale.rows_affected() > 0 {
            tracing::info!(
                %wallet_id,
                policy = %plan.stale_policy,
                rows = stale.rows_affected(),
                "stale holdings updated"
            );
        }

        let row = sqlx::query(&format!(
            "UPDATE wallets SET value = $2, updated_at = NOW() WHERE id = $1 RETURNING {WALLET_COLUMNS}"
        ))
        .bind(wallet_id)
        .bind(plan.total_value)
        .fetch_one(&mut *tx)
        .await
        .context("update wallet value")?;
        let wallet = Self::row_to_wallet(&row)?;

        sqlx::query("INSERT INTO wallet_snapshots (id, wallet_id, value, created_at) VALUES ($1, $2, $3, $4)")
            .bind(Uuid::new_v4())
            .bind(wallet_id)
            .bind(plan.total_value)
            .bind(plan.recorded_at)
            .execute(&mut *tx)
            .await
            .context("insert wallet snapshot")?;

        tx.commit().await?;
        Ok(wallet)
    }

    async fn find_wallet_by_address(&self, address: &str) -> Result<Option<Wallet>> {
        let row = sqlx::query(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE address = $1"
        ))
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| Self::row_to_wallet(&row)).transpose()
    }

    async fn list_wallets(&self) -> Result<Vec<Wallet>> {
        let rows = sqlx::query(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_wallet).collect()
    }

    async fn list_wallets_by_user(&self, user_id: Uuid) -> Result<Vec<Wallet>> {
        let rows = sqlx::query(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = $1 ORDER BY created_at ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_wallet).collect()
    }

    async fn holdings_for_wallet(&self, wallet_id: Uuid) -> Result<Vec<TokenHolding>> {
        let rows = sqlx::query(
            "SELECT id, user_id, wallet_id, token_id, amount, value
             FROM token_holdings WHERE wallet_id = $1 ORDER BY created_at ASC",
        )
        .bind(wallet_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| {
                Ok(TokenHolding {
                    id: row.try_get("id")?,
                    user_id: row.try_get("user_id")?,
                    wallet_id: row.try_get("wallet_id")?,
                    token_id: row.try_get("token_id")?,
                    amount: row.try_get("amount")?,
                    value: row.try_get("value")?,
                })
            })
            .collect()
    }

    async fn snapshots_for_wallet(
        &self,
        wallet_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<WalletSnapshot>> {
        let rows = sqlx::query(
            "SELECT id, wallet_id, value, created_at FROM wallet_snapshots
             WHERE wallet_id = $1 AND created_at >= $2
             ORDER BY created_at ASC",
        )
        .bind(wallet_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| {
                Ok(WalletSnapshot {
                    id: row.try_get("id")?,
                    wallet_id: row.try_get("wallet_id")?,
                    value: row.try_get("value")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}
