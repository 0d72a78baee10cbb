use std::collections::{BTreeMap, HashMap};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use domain::{NewToken, SwapLeg, TokenSwap};
use sqlx::{postgres::PgRow, types::Json, PgPool, Row};
use uuid::Uuid;

use super::token_repository::insert_or_fetch_token;

/// A swap ready to store together with the token its base leg refers to.
///
/// `swap.id` and `swap.token_id` are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapRecord {
    pub base_token: NewToken,
    pub swap: TokenSwap,
}

#[async_trait]
pub trait SwapRepository: Send + Sync {
    /// Upserts the batch by transaction hash in one transaction and returns the stored rows.
    async fn upsert_swaps(&self, records: &[SwapRecord]) -> Result<Vec<TokenSwap>>;
    async fn swaps_for_token(&self, token_id: Uuid) -> Result<Vec<TokenSwap>>;
    async fn swaps_for_wallet(&self, wallet_id: Uuid) -> Result<Vec<TokenSwap>>;
    async fn count_swaps(&self) -> Result<i64>;
}

const SWAP_COLUMNS: &str = "id, chain_id, token_id, wallet_id, transaction_hash, transaction_type, \
     transaction_index, sub_category, block_timestamp, block_number, wallet_address, pair_address, \
     pair_label, exchange_address, exchange_name, exchange_logo, base_token, quote_token, bought, \
     sold, base_quote_price, total_value_usd";

#[derive(Clone)]
pub struct PostgresSwapRepository {
    pool: PgPool,
}

impl PostgresSwapRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_swap(row: &PgRow) -> Result<TokenSwap> {
        let transaction_type: String = row.try_get("transaction_type")?;
        let Json(bought): Json<SwapLeg> = row.try_get("bought")?;
        let Json(sold): Json<SwapLeg> = row.try_get("sold")?;
        Ok(TokenSwap {
            id: row.try_get("id")?,
            chain_id: row.try_get("chain_id")?,
            token_id: row.try_get("token_id")?,
            wallet_id: row.try_get("wallet_id")?,
            transaction_hash: row.try_get("transaction_hash")?,
            transaction_type: transaction_type.parse().map_err(|err: String| anyhow!(err))?,
            transaction_index: row.try_get("transaction_index")?,
            sub_category: row.try_get("sub_category")?,
            block_timestamp: row.try_get("block_timestamp")?,
            block_number: row.try_get("block_number")?,
            wallet_address: row.try_get("wallet_address")?,
            pair_address: row.try_get("pair_address")?,
            pair_label: row.try_get("pair_label")?,
            exchange_address: row.try_get("exchange_address")?,
            exchange_name: row.try_get("exchange_name")?,
            exchange_logo: row.try_get("exchange_logo")?,
            base_token: row.try_get("base_token")?,
            quote_token: row.try_get("quote_token")?,
            bought,
            sold,
            base_quote_price: row.try_get("base_quote_price")?,
            total_value_usd: row.try_get("total_value_usd")?,
        })
    }
}

#[async_trait]
impl SwapRepository for PostgresSwapRepository {
    async fn upsert_swaps(&self, records: &[SwapRecord]) -> Result<Vec<TokenSwap>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        // tokens first, sorted by mint, matching the lock order of a portfolio refresh
        let base_tokens: BTreeMap<&str, &NewToken> = records
            .iter()
            .map(|record| (record.base_token.mint.as_str(), &record.base_token))
            .collect();

        let mut tx = self.pool.begin().await?;
        let mut token_ids: HashMap<&str, Uuid> = HashMap::with_capacity(base_tokens.len());
        for (mint, base_token) in base_tokens {
            let token = insert_or_fetch_token(&mut tx, base_token)
                .await
                .with_context(|| format!("ensure token {mint}"))?;
            token_ids.insert(mint, token.id);
        }

        let mut stored = Vec::with_capacity(records.len());
        for record in records {
            let token_id = token_ids
                .get(record.base_token.mint.as_str())
                .copied()
                .ok_or_else(|| anyhow!("token {} was not ensured", record.base_token.mint))?;
            let swap = &record.swap;
            // upstream is the source of truth, so every column is overwritten on conflict
            let row = sqlx::query(&format!(
                "INSERT INTO tokenswaps (id, chain_id, token_id, wallet_id, transaction_hash,
                    transaction_type, transaction_index, sub_category, block_timestamp, block_number,
                    wallet_address, pair_address, pair_label, exchange_address, exchange_name,
                    exchange_logo, base_token, quote_token, bought, sold, base_quote_price,
                    total_value_usd)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22)
                 ON CONFLICT (transaction_hash) DO UPDATE
                 SET chain_id = EXCLUDED.chain_id,
                     token_id = EXCLUDED.token_id,
                     wallet_id = EXCLUDED.wallet_id,
                     transaction_type = EXCLUDED.transaction_type,
                     transaction_index = EXCLUDED.transaction_index,
                     sub_category = EXCLUDED.sub_category,
                     block_timestamp = EXCLUDED.block_timestamp,
                     block_number = EXCLUDED.block_number,
                     wallet_address = EXCLUDED.wallet_address,
                     pair_address = EXCLUDED.pair_address,
                     pair_label = EXCLUDED.pair_label,
                     exchange_address = EXCLUDED.exchange_address,
                     exchange_name = EXCLUDED.exchange_name,
                     exchange_logo = EXCLUDED.exchange_logo,
                     base_token = EXCLUDED.base_token,
                     quote_token = EXCLUDED.quote_token,
                     bought = EXCLUDED.bought,
                     sold = EXCLUDED.sold,
                     base_quote_price = EXCLUDED.base_quote_price,
                     total_value_usd = EXCLUDED.total_value_usd,
                     updated_at = NOW()
                 RETURNING {SWAP_COLUMNS}"
            ))
            .bind(Uuid::new_v4())
            .bind(&swap.chain_id)
            .bind(token_id)
            .bind(swap.wallet_id)
            .bind(&swap.transaction_hash)
            .bind(swap.transaction_type.as_str())
            .bind(swap.transaction_index)
            .bind(&swap.sub_category)
            .bind(swap.block_timestamp)
            .bind(swap.block_number)
            .bind(&swap.wallet_address)
            .bind(&swap.pair_address)
            .bind(&swap.pair_label)
            .bind(&swap.exchange_address)
            .bind(&swap.exchange_name)
            .bind(&swap.exchange_logo)
            .bind(&swap.base_token)
            .bind(&swap.quote_token)
            .bind(Json(&swap.bought))
            .bind(Json(&swap.sold))
            .bind(swap.base_quote_price)
            .bind(swap.total_value_usd)
            .fetch_one(&mut *tx)
            .await
            .with_context(|| format!("upsert swap {}", swap.transaction_hash))?;
            stored.push(Self::row_to_swap(&row)?);
        }
        tx.commit().await?;
        Ok(stored)
    }

    async fn swaps_for_token(&self, token_id: Uuid) -> Result<Vec<TokenSwap>> {
        let rows = sqlx::query(&format!(
            "SELECT {SWAP_COLUMNS} FROM tokenswaps WHERE token_id = $1 ORDER BY block_timestamp ASC"
        ))
        .bind(token_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_swap).collect()
    }

    async fn swaps_for_wallet(&self, wallet_id: Uuid) -> Result<Vec<TokenSwap>> {
        let rows = sqlx::query(&format!(
            "SELECT {SWAP_COLUMNS} FROM tokenswaps WHERE wallet_id = $1 ORDER BY block_timestamp DESC"
        ))
        .bind(wallet_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_swap).collect()
    }

    async fn count_swaps(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM tokenswaps")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("count")?)
    }
}
