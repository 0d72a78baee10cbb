//! Response bodies of the chain-indexing API.
//!
//! The API sends amounts as decimal strings and prices as numbers, and leaves optional
//! fields out or sets them to `null`; decoding accepts all of those shapes.

use chrono::{DateTime, Utc};
use domain::SwapLeg;
use indexer::{IngestError, IngestResult};
use serde::{de::Error as _, Deserialize, Deserializer};
use serde_json::Value;

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s.trim().parse().map(Some).map_err(D::Error::custom),
        Some(other) => Err(D::Error::custom(format!("expected a number, got {other}"))),
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_opt_f64(deserializer)?.unwrap_or(0.0))
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| D::Error::custom(format!("expected an integer, got {n}"))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(0),
        Some(Value::String(s)) => s.trim().parse().map_err(D::Error::custom),
        Some(other) => Err(D::Error::custom(format!("expected an integer, got {other}"))),
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioPayload {
    #[serde(default, deserialize_with = "nullable")]
    pub native_balance: NativeBalance,
    #[serde(default, deserialize_with = "nullable")]
    pub tokens: Vec<TokenBalancePayload>,
}

impl PortfolioPayload {
    pub fn from_raw(raw: &Value) -> IngestResult<Self> {
        Self::deserialize(raw)
            .map_err(|err| IngestError::Upstream(format!("malformed portfolio payload: {err}")))
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct NativeBalance {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub solana: f64,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalancePayload {
    #[serde(default, deserialize_with = "nullable")]
    pub associated_token_address: String,
    pub mint: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub amount: f64,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub symbol: String,
    #[serde(default)]
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenPrice {
    pub token_address: String,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub usd_price: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LegPayload {
    pub address: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub amount: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub usd_price: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub usd_amount: f64,
    #[serde(default, deserialize_with = "nullable")]
    pub symbol: String,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub token_type: String,
}

impl From<LegPayload> for SwapLeg {
    fn from(leg: LegPayload) -> Self {
        SwapLeg {
            address: leg.address,
            amount: leg.amount,
            usd_price: leg.usd_price,
            usd_amount: leg.usd_amount,
            symbol: leg.symbol,
            logo: leg.logo,
            name: leg.name,
            token_type: leg.token_type,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SwapPayload {
    pub transaction_hash: String,
    pub transaction_type: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub transaction_index: i64,
    #[serde(default)]
    pub sub_category: Option<String>,
    pub block_timestamp: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub block_number: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub wallet_address: String,
    #[serde(default, deserialize_with = "nullable")]
    pub pair_address: String,
    #[serde(default, deserialize_with = "nullable")]
    pub pair_label: String,
    #[serde(default, deserialize_with = "nullable")]
    pub exchange_address: String,
    #[serde(default, deserialize_with = "nullable")]
    pub exchange_name: String,
    #[serde(default)]
    pub exchange_logo: Option<String>,
    pub base_token: String,
    #[serde(default, deserialize_with = "nullable")]
    pub quote_token: String,
    pub bought: LegPayload,
    pub sold: LegPayload,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub base_quote_price: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_value_usd: f64,
}
