use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_WALLET_NAME: &str = "My New Wallet";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub address: String,
    pub name: Option<String>,
    pub chain_id: String,
    pub chain_token_amount: f64,
    pub value: f64,
    pub favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Shared reference data: one row per mint, visible to every wallet.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Token {
    pub id: Uuid,
    pub chain_id: String,
    pub name: String,
    pub symbol: String,
    pub logo: Option<String>,
    pub address: String,
    pub mint: String,
    pub current_price: f64,
}

/// Token metadata as seen by an ingestion pass, before it has a row id.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NewToken {
    pub chain_id: String,
    pub name: String,
    pub symbol: String,
    pub logo: Option<String>,
    pub address: String,
    pub mint: String,
    pub current_price: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TokenHolding {
    pub id: Uuid,
    pub user_id: Uuid,
    pub wallet_id: Uuid,
    pub token_id: Uuid,
    pub amount: f64,
    pub value: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Buy,
    Sell,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Buy => "buy",
            TransactionType::Sell => "sell",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(TransactionType::Buy),
            "sell" => Ok(TransactionType::Sell),
            other => Err(format!("unknown transaction type {other:?}")),
        }
    }
}

/// One side of a swap, stored verbatim as JSON.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SwapLeg {
    pub address: String,
    pub amount: f64,
    pub usd_price: f64,
    pub usd_amount: f64,
    pub symbol: String,
    pub logo: Option<String>,
    pub name: String,
    pub token_type: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TokenSwap {
    pub id: Uuid,
    pub chain_id: String,
    pub token_id: Uuid,
    pub wallet_id: Uuid,
    pub transaction_hash: String,
    pub transaction_type: TransactionType,
    pub transaction_index: i64,
    pub sub_category: Option<String>,
    pub block_timestamp: DateTime<Utc>,
    pub block_number: i64,
    pub wallet_address: String,
    pub pair_address: String,
    pub pair_label: String,
    pub exchange_address: String,
    pub exchange_name: String,
    pub exchange_logo: Option<String>,
    pub base_token: String,
    pub quote_token: String,
    pub bought: SwapLeg,
    pub sold: SwapLeg,
    pub base_quote_price: f64,
    pub total_value_usd: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WalletSnapshot {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub value: f64,
    pub created_at: DateTime<Utc>,
}

/// Single-lot average-cost profit report for one token.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct PnLReport {
    pub total_bought_usd: f64,
    pub total_bought_amount: f64,
    pub total_sold_usd: f64,
    pub total_sold_amount: f64,
    pub average_buy_price: f64,
    pub realized_pnl: f64,
    pub remaining_amount: f64,
    pub unrealized_pnl: f64,
    pub total_pnl: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WalletFailure {
    pub wallet_id: Uuid,
    pub address: String,
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct RefreshSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Wallets never dispatched because shutdown was requested.
    pub skipped: usize,
    pub failures: Vec<WalletFailure>,
}

impl RefreshSummary {
    pub fn all_failed(&self) -> bool {
        self.total > 0 && self.failed == self.total
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WalletOverview {
    pub user_id: Uuid,
    pub total_value: f64,
    pub daily_change_pct: Option<f64>,
    pub monthly_change_pct: Option<f64>,
    pub wallets: Vec<Wallet>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_type_parses_case_insensitively() {
        assert_eq!("Buy".parse::<TransactionType>(), Ok(TransactionType::Buy));
        assert_eq!(" SELL ".parse::<TransactionType>(), Ok(TransactionType::Sell));
        assert!("transfer".parse::<TransactionType>().is_err());
    }

    #[test]
    fn swap_leg_uses_upstream_field_names() {
        let leg = SwapLeg {
            address: "mint".to_string(),
            amount: 1.5,
            usd_price: 2.0,
            usd_amount: 3.0,
            symbol: "ABC".to_string(),
            logo: None,
            name: "Abc".to_string(),
            token_type: "token0".to_string(),
        };
        let value = serde_json::to_value(&leg).unwrap();
        assert_eq!(value["usdPrice"], 2.0);
        assert_eq!(value["usdAmount"], 3.0);
        assert_eq!(value["tokenType"], "token0");
    }

    #[test]
    fn summary_reports_total_failure_only_when_every_wallet_failed() {
        let mut summary = RefreshSummary {
            total: 2,
            failed: 2,
            ..Default::default()
        };
        assert!(summary.all_failed());
        summary.failed = 1;
        summary.succeeded = 1;
        assert!(!summary.all_failed());
        assert!(!RefreshSummary::default().all_failed());
    }
}
