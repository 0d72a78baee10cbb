use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use domain::NewToken;
use indexer::IngestError;
use tracing::warn;
use uuid::Uuid;

use super::payload::{PortfolioPayload, TokenPrice};
use crate::repositories::{HoldingUpsert, ReconciliationPlan, StaleHoldingPolicy, WalletUpsert};

/// Distinct mints of the payload in first-seen order; the input of the single price request.
pub fn distinct_mints(payload: &PortfolioPayload) -> Vec<String> {
    let mut seen = HashSet::new();
    payload
        .tokens
        .iter()
        .filter(|token| seen.insert(token.mint.as_str()))
        .map(|token| token.mint.clone())
        .collect()
}

pub struct PlanInput<'a> {
    pub user_id: Uuid,
    pub address: &'a str,
    pub chain_id: &'a str,
    pub payload: &'a PortfolioPayload,
    pub prices: &'a [TokenPrice],
    pub stale_policy: StaleHoldingPolicy,
    pub recorded_at: DateTime<Utc>,
}

/// Prices every balance and sums the wallet value.
///
/// A mint without a usable price is valued at 0. Balances repeated for the same mint are
/// merged into one holding.
pub fn build_plan(input: PlanInput<'_>) -> ReconciliationPlan {
    let prices: HashMap<&str, f64> = input
        .prices
        .iter()
        .filter_map(|p| {
            p.usd_price
                .filter(|price| price.is_finite())
                .map(|price| (p.token_address.as_str(), price))
        })
        .collect();

    // sorted by mint so concurrent refreshes lock token rows in the same order
    let mut holdings: BTreeMap<&str, HoldingUpsert> = BTreeMap::new();
    for balance in &input.payload.tokens {
        let fetched_price = prices.get(balance.mint.as_str()).copied();
        let price = match fetched_price {
            Some(price) => price,
            None => {
                let issue =
                    IngestError::InconsistentData(format!("no price for mint {}", balance.mint));
                warn!(
                    error = %issue,
                    wallet = %input.address,
                    mint = %balance.mint,
                    "price missing, valuing holding at 0"
                );
                0.0
            }
        };

        let entry = holdings
            .entry(balance.mint.as_str())
            .or_insert_with(|| HoldingUpsert {
                token: NewToken {
                    chain_id: input.chain_id.to_string(),
                    name: balance.name.clone(),
                    symbol: balance.symbol.clone(),
                    logo: balance.logo.clone(),
                    address: balance.associated_token_address.clone(),
                    mint: balance.mint.clone(),
                    current_price: price,
                },
                fetched_price,
                amount: 0.0,
                value: 0.0,
            });
        entry.amount += balance.amount;
        entry.value = entry.amount * price;
    }

    let holdings: Vec<HoldingUpsert> = holdings.into_values().collect();
    let total_value = holdings.iter().map(|h| h.value).sum();

    ReconciliationPlan {
        wallet: WalletUpsert {
            user_id: input.user_id,
            address: input.address.to_string(),
            chain_id: input.chain_id.to_string(),
            chain_token_amount: input.payload.native_balance.solana,
        },
        holdings,
        total_value,
        stale_policy: input.stale_policy,
        recorded_at: input.recorded_at,
    }
}
