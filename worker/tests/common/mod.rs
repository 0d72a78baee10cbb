#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use indexer::{IngestError, IngestResult, RawPortfolio};
use serde_json::{json, Value};
use worker::{
    repositories::InMemoryStore,
    services::{DbPortfolioService, PortfolioSource, RefreshOptions, TokenPrice},
};

pub const CHAIN: &str = "solana-mainnet";

/// Scripted upstream: canned payloads per address plus failure switches.
#[derive(Default)]
pub struct StubSource {
    portfolios: Mutex<HashMap<String, Value>>,
    prices: Mutex<HashMap<String, Option<f64>>>,
    swaps: Mutex<HashMap<String, Vec<Value>>>,
    /// Remaining failures per address; `usize::MAX` fails forever.
    failures: Mutex<HashMap<String, usize>>,
    pub portfolio_calls: AtomicUsize,
    pub price_requests: Mutex<Vec<Vec<String>>>,
}

impl StubSource {
    pub fn set_portfolio(&self, address: &str, body: Value) {
        self.portfolios
            .lock()
            .unwrap()
            .insert(address.to_string(), body);
    }

    pub fn set_price(&self, mint: &str, price: Option<f64>) {
        self.prices.lock().unwrap().insert(mint.to_string(), price);
    }

    /// Leaves `mint` out of every later price response.
    pub fn clear_price(&self, mint: &str) {
        self.prices.lock().unwrap().remove(mint);
    }

    pub fn set_swaps(&self, address: &str, entries: Vec<Value>) {
        self.swaps
            .lock()
            .unwrap()
            .insert(address.to_string(), entries);
    }

    pub fn fail(&self, address: &str) {
        self.fail_times(address, usize::MAX);
    }

    pub fn fail_times(&self, address: &str, times: usize) {
        self.failures
            .lock()
            .unwrap()
            .insert(address.to_string(), times);
    }

    pub fn calls(&self) -> usize {
        self.portfolio_calls.load(Ordering::SeqCst)
    }

    fn check(&self, address: &str) -> IngestResult<()> {
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(address) {
            Some(0) | None => Ok(()),
            Some(remaining) => {
                if *remaining != usize::MAX {
                    *remaining -= 1;
                }
                Err(IngestError::Upstream(format!(
                    "portfolio for {address} returned status 503 Service Unavailable"
                )))
            }
        }
    }
}

#[async_trait]
impl PortfolioSource for StubSource {
    async fn fetch_portfolio(&self, address: &str) -> IngestResult<RawPortfolio> {
        self.portfolio_calls.fetch_add(1, Ordering::SeqCst);
        self.check(address)?;
        Ok(self
            .portfolios
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or_else(|| portfolio("0", &[])))
    }

    async fn fetch_prices(&self, mints: &[String]) -> IngestResult<Vec<TokenPrice>> {
        self.price_requests.lock().unwrap().push(mints.to_vec());
        let prices = self.prices.lock().unwrap();
        Ok(mints
            .iter()
            .filter_map(|mint| {
                prices.get(mint).map(|price| TokenPrice {
                    token_address: mint.clone(),
                    usd_price: *price,
                })
            })
            .collect())
    }

    async fn fetch_swaps(&self, address: &str) -> IngestResult<Vec<Value>> {
        Ok(self
            .swaps
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or_default())
    }
}

pub fn portfolio(native: &str, tokens: &[(&str, f64)]) -> Value {
    let tokens: Vec<Value> = tokens
        .iter()
        .map(|(mint, amount)| {
            json!({
                "associatedTokenAddress": format!("ata-{mint}"),
                "mint": mint,
                "amount": amount.to_string(),
                "decimals": 6,
                "name": format!("Token {mint}"),
                "symbol": mint,
                "logo": null
            })
        })
        .collect();
    json!({
        "nativeBalance": { "lamports": "0", "solana": native },
        "tokens": tokens
    })
}

/// One swap of `amount` base tokens at `usd_price` each against SOL.
pub fn swap_entry(
    hash: &str,
    kind: &str,
    wallet: &str,
    base: &str,
    amount: f64,
    usd_price: f64,
) -> Value {
    let usd = amount * usd_price;
    let base_leg = json!({
        "address": base,
        "amount": amount.to_string(),
        "usdPrice": usd_price,
        "usdAmount": usd,
        "symbol": base,
        "logo": null,
        "name": format!("Token {base}"),
        "tokenType": "token0"
    });
    let sol_leg = json!({
        "address": "So11111111111111111111111111111111111111112",
        "amount": (usd / 200.0).to_string(),
        "usdPrice": 200.0,
        "usdAmount": usd,
        "symbol": "SOL",
        "logo": null,
        "name": "Wrapped SOL",
        "tokenType": "token1"
    });
    let (bought, sold) = if kind == "buy" {
        (base_leg, sol_leg)
    } else {
        (sol_leg, base_leg)
    };
    json!({
        "transactionHash": hash,
        "transactionType": kind,
        "transactionIndex": 1,
        "blockTimestamp": "2024-11-28T09:44:55.000Z",
        "blockNumber": 302000000,
        "walletAddress": wallet,
        "pairAddress": "Pair1",
        "pairLabel": format!("{base}/SOL"),
        "exchangeAddress": "Dex1",
        "exchangeName": "Raydium AMM v4",
        "baseToken": base,
        "quoteToken": "So11111111111111111111111111111111111111112",
        "bought": bought,
        "sold": sold,
        "baseQuotePrice": "0.01",
        "totalValueUsd": usd
    })
}

pub fn service(
    store: &Arc<InMemoryStore>,
    source: &Arc<StubSource>,
    options: RefreshOptions,
) -> DbPortfolioService<StubSource> {
    DbPortfolioService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        source.clone(),
        options,
    )
}

pub fn setup() -> (Arc<InMemoryStore>, Arc<StubSource>) {
    (Arc::new(InMemoryStore::new()), Arc::new(StubSource::default()))
}
