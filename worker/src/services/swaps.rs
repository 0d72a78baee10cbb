use std::collections::HashSet;

use domain::{NewToken, TokenSwap, TransactionType, Wallet};
use indexer::{IngestError, IngestResult};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use super::payload::{LegPayload, SwapPayload};
use crate::repositories::SwapRecord;

/// The leg whose address is the entry's declared base token.
fn base_leg(entry: &SwapPayload) -> Option<&LegPayload> {
    if entry.bought.address == entry.base_token {
        Some(&entry.bought)
    } else if entry.sold.address == entry.base_token {
        Some(&entry.sold)
    } else {
        None
    }
}

pub fn swap_record(
    entry: SwapPayload,
    wallet: &Wallet,
    chain_id: &str,
) -> IngestResult<SwapRecord> {
    let transaction_type: TransactionType = entry.transaction_type.parse().map_err(|err| {
        IngestError::InconsistentData(format!("swap {}: {err}", entry.transaction_hash))
    })?;
    let base = base_leg(&entry).ok_or_else(|| {
        IngestError::InconsistentData(format!(
            "swap {}: base token {} matches neither leg",
            entry.transaction_hash, entry.base_token
        ))
    })?;

    let base_token = NewToken {
        chain_id: chain_id.to_string(),
        name: base.name.clone(),
        symbol: base.symbol.clone(),
        logo: base.logo.clone(),
        address: entry.base_token.clone(),
        mint: base.address.clone(),
        current_price: base.usd_price,
    };

    let swap = TokenSwap {
        id: Uuid::nil(),
        chain_id: chain_id.to_string(),
        token_id: Uuid::nil(),
        wallet_id: wallet.id,
        transaction_hash: entry.transaction_hash,
        transaction_type,
        transaction_index: entry.transaction_index,
        sub_category: entry.sub_category,
        block_timestamp: entry.block_timestamp,
        block_number: entry.block_number,
        wallet_address: entry.wallet_address,
        pair_address: entry.pair_address,
        pair_label: entry.pair_label,
        exchange_address: entry.exchange_address,
        exchange_name: entry.exchange_name,
        exchange_logo: entry.exchange_logo,
        base_token: entry.base_token,
        quote_token: entry.quote_token,
        bought: entry.bought.into(),
        sold: entry.sold.into(),
        base_quote_price: entry.base_quote_price,
        total_value_usd: entry.total_value_usd,
    };

    Ok(SwapRecord { base_token, swap })
}

/// Turns raw entries into records, skipping the ones that cannot be stored. A hash listed
/// twice keeps its first (newest) entry.
pub fn swap_records(entries: Vec<Value>, wallet: &Wallet, chain_id: &str) -> Vec<SwapRecord> {
    let mut hashes = HashSet::new();
    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        let record = serde_json::from_value::<SwapPayload>(entry)
            .map_err(|err| IngestError::InconsistentData(format!("unreadable swap entry: {err}")))
            .and_then(|payload| swap_record(payload, wallet, chain_id));
        match record {
            Ok(record) => {
                if hashes.insert(record.swap.transaction_hash.clone()) {
                    records.push(record);
                }
            }
            Err(err) => warn!(error = %err, wallet = %wallet.address, "skipping swap entry"),
        }
    }
    records
}
