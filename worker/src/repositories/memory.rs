//! Process-local store with the same identity keys as the Postgres schema.

use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{NewToken, Token, TokenHolding, TokenSwap, Wallet, WalletSnapshot, DEFAULT_WALLET_NAME};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    PortfolioStore, ReconciliationPlan, StaleHoldingPolicy, SwapRecord, SwapRepository,
    TokenRepository,
};

#[derive(Default, Clone)]
struct State {
    wallets: Vec<Wallet>,
    tokens: Vec<Token>,
    holdings: Vec<TokenHolding>,
    swaps: Vec<TokenSwap>,
    snapshots: Vec<WalletSnapshot>,
}

impl State {
    fn token_by_mint(&mut self, token: &NewToken) -> &mut Token {
        let index = match self.tokens.iter().position(|t| t.mint == token.mint) {
            Some(index) => index,
            None => {
                self.tokens.push(Token {
                    id: Uuid::new_v4(),
                    chain_id: token.chain_id.clone(),
                    name: token.name.clone(),
                    symbol: token.symbol.clone(),
                    logo: token.logo.clone(),
                    address: token.address.clone(),
                    mint: token.mint.clone(),
                    current_price: token.current_price,
                });
                self.tokens.len() - 1
            }
        };
        &mut self.tokens[index]
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    failing_addresses: Mutex<HashSet<String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every write for `address` fail, leaving stored state untouched.
    pub async fn fail_writes_for(&self, address: &str) {
        self.failing_addresses.lock().await.insert(address.to_string());
    }

    pub async fn tokens(&self) -> Vec<Token> {
        self.state.lock().await.tokens.clone()
    }

    pub async fn all_snapshots(&self) -> Vec<WalletSnapshot> {
        self.state.lock().await.snapshots.clone()
    }

    /// Seeds a snapshot with an arbitrary timestamp.
    pub async fn insert_snapshot(&self, wallet_id: Uuid, value: f64, created_at: DateTime<Utc>) {
        self.state.lock().await.snapshots.push(WalletSnapshot {
            id: Uuid::new_v4(),
            wallet_id,
            value,
            created_at,
        });
    }

    /// Updates the user-owned wallet fields.
    pub async fn rename_wallet(&self, address: &str, name: &str, favorite: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        let wallet = state
            .wallets
            .iter_mut()
            .find(|w| w.address == address)
            .ok_or_else(|| anyhow!("wallet {address} not found"))?;
        wallet.name = Some(name.to_string());
        wallet.favorite = favorite;
        Ok(())
    }

    async fn check_writable(&self, address: &str) -> Result<()> {
        if self.failing_addresses.lock().await.contains(address) {
            return Err(anyhow!("write rejected for wallet {address}"));
        }
        Ok(())
    }
}

#[async_trait]
impl PortfolioStore for InMemoryStore {
    async fn apply_reconciliation(&self, plan: &ReconciliationPlan) -> Result<Wallet> {
        self.check_writable(&plan.wallet.address).await?;
        let mut guard = self.state.lock().await;
        // work on a copy so a failure leaves nothing half-written
        let mut state = guard.clone();
        let now = Utc::now();

        let wallet_index = match state
            .wallets
            .iter()
            .position(|w| w.address == plan.wallet.address)
        {
            Some(index) => {
                let wallet = &mut state.wallets[index];
                wallet.chain_token_amount = plan.wallet.chain_token_amount;
                wallet.chain_id = plan.wallet.chain_id.clone();
                wallet.user_id = plan.wallet.user_id;
                wallet.updated_at = now;
                index
            }
            None => {
                state.wallets.push(Wallet {
                    id: Uuid::new_v4(),
                    user_id: plan.wallet.user_id,
                    address: plan.wallet.address.clone(),
                    name: Some(DEFAULT_WALLET_NAME.to_string()),
                    chain_id: plan.wallet.chain_id.clone(),
                    chain_token_amount: plan.wallet.chain_token_amount,
                    value: 0.0,
                    favorite: false,
                    created_at: now,
                    updated_at: now,
                });
                state.wallets.len() - 1
            }
        };
        let wallet_id = state.wallets[wallet_index].id;

        let mut seen = HashSet::new();
        for holding in &plan.holdings {
            let token = state.token_by_mint(&holding.token);
            if let Some(price) = holding.fetched_price {
                token.current_price = price;
            }
            let token_id = token.id;
            seen.insert(token_id);

            match state
                .holdings
                .iter_mut()
                .find(|h| h.wallet_id == wallet_id && h.token_id == token_id)
            {
                Some(existing) => {
                    existing.amount = holding.amount;
                    existing.value = holding.value;
                    existing.user_id = plan.wallet.user_id;
                }
                None => state.holdings.push(TokenHolding {
                    id: Uuid::new_v4(),
                    user_id: plan.wallet.user_id,
                    wallet_id,
                    token_id,
                    amount: holding.amount,
                    value: holding.value,
                }),
            }
        }

        match plan.stale_policy {
            StaleHoldingPolicy::Zero => state
                .holdings
                .iter_mut()
                .filter(|h| h.wallet_id == wallet_id && !seen.contains(&h.token_id))
                .for_each(|h| {
                    h.amount = 0.0;
                    h.value = 0.0;
                }),
            StaleHoldingPolicy::Delete => state
                .holdings
                .retain(|h| h.wallet_id != wallet_id || seen.contains(&h.token_id)),
        }

        state.wallets[wallet_index].value = plan.total_value;
        state.snapshots.push(WalletSnapshot {
            id: Uuid::new_v4(),
            wallet_id,
            value: plan.total_value,
            created_at: plan.recorded_at,
        });

        let wallet = state.wallets[wallet_index].clone();
        *guard = state;
        Ok(wallet)
    }

    async fn find_wallet_by_address(&self, address: &str) -> Result<Option<Wallet>> {
        let state = self.state.lock().await;
        Ok(state.wallets.iter().find(|w| w.address == address).cloned())
    }

    async fn list_wallets(&self) -> Result<Vec<Wallet>> {
        Ok(self.state.lock().await.wallets.clone())
    }

    async fn list_wallets_by_user(&self, user_id: Uuid) -> Result<Vec<Wallet>> {
        let state = self.state.lock().await;
        Ok(state
            .wallets
            .iter()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn holdings_for_wallet(&self, wallet_id: Uuid) -> Result<Vec<TokenHolding>> {
        let state = self.state.lock().await;
        Ok(state
            .holdings
            .iter()
            .filter(|h| h.wallet_id == wallet_id)
            .cloned()
            .collect())
    }

    async fn snapshots_for_wallet(
        &self,
        wallet_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<WalletSnapshot>> {
        let state = self.state.lock().await;
        let mut snapshots: Vec<_> = state
            .snapshots
            .iter()
            .filter(|s| s.wallet_id == wallet_id && s.created_at >= since)
            .cloned()
            .collect();
        snapshots.sort_by_key(|s| s.created_at);
        Ok(snapshots)
    }
}

#[async_trait]
impl TokenRepository for InMemoryStore {
    async fn find_by_mint(&self, mint: &str) -> Result<Option<Token>> {
        let state = self.state.lock().await;
        Ok(state.tokens.iter().find(|t| t.mint == mint).cloned())
    }

    async fn ensure_token(&self, token: &NewToken) -> Result<Token> {
        let mut state = self.state.lock().await;
        Ok(state.token_by_mint(token).clone())
    }
}

#[async_trait]
impl SwapRepository for InMemoryStore {
    async fn upsert_swaps(&self, records: &[SwapRecord]) -> Result<Vec<TokenSwap>> {
        for record in records {
            self.check_writable(&record.swap.wallet_address).await?;
        }
        let mut state = self.state.lock().await;
        let mut stored = Vec::with_capacity(records.len());
        let mut by_hash: HashMap<String, usize> = state
            .swaps
            .iter()
            .enumerate()
            .map(|(index, swap)| (swap.transaction_hash.clone(), index))
            .collect();

        for record in records {
            let token_id = state.token_by_mint(&record.base_token).id;
            let mut swap = record.swap.clone();
            swap.token_id = token_id;
            match by_hash.get(&swap.transaction_hash) {
                Some(&index) => {
                    swap.id = state.swaps[index].id;
                    state.swaps[index] = swap.clone();
                }
                None => {
                    swap.id = Uuid::new_v4();
                    by_hash.insert(swap.transaction_hash.clone(), state.swaps.len());
                    state.swaps.push(swap.clone());
                }
            }
            stored.push(swap);
        }
        Ok(stored)
    }

    async fn swaps_for_token(&self, token_id: Uuid) -> Result<Vec<TokenSwap>> {
        let state = self.state.lock().await;
        let mut swaps: Vec<_> = state
            .swaps
            .iter()
            .filter(|s| s.token_id == token_id)
            .cloned()
            .collect();
        swaps.sort_by_key(|s| s.block_timestamp);
        Ok(swaps)
    }

    async fn swaps_for_wallet(&self, wallet_id: Uuid) -> Result<Vec<TokenSwap>> {
        let state = self.state.lock().await;
        let mut swaps: Vec<_> = state
            .swaps
            .iter()
            .filter(|s| s.wallet_id == wallet_id)
            .cloned()
            .collect();
        swaps.sort_by_key(|s| std::cmp::Reverse(s.block_timestamp));
        Ok(swaps)
    }

    async fn count_swaps(&self) -> Result<i64> {
        Ok(self.state.lock().await.swaps.len() as i64)
    }
}
