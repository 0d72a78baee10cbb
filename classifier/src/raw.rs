//! Raw transaction shape as returned by a Solana `getTransaction` JSON-RPC call.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    #[serde(default)]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub slot: Option<u64>,
    #[serde(default, deserialize_with = "nullable")]
    pub meta: TransactionMeta,
    #[serde(default)]
    pub transaction: TransactionEnvelope,
}

impl RawTransaction {
    /// Static account keys followed by keys loaded through address lookup tables, in the
    /// order balance arrays are indexed.
    pub fn account_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .transaction
            .message
            .account_keys
            .iter()
            .map(AccountKey::pubkey)
            .collect();
        keys.extend(self.meta.loaded_addresses.writable.iter().map(String::as_str));
        keys.extend(self.meta.loaded_addresses.readonly.iter().map(String::as_str));
        keys
    }

    pub fn signature(&self) -> Option<&str> {
        self.transaction.signatures.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEnvelope {
    #[serde(default, deserialize_with = "nullable")]
    pub signatures: Vec<String>,
    #[serde(default)]
    pub message: Message,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default, deserialize_with = "nullable")]
    pub account_keys: Vec<AccountKey>,
    #[serde(default, deserialize_with = "nullable")]
    pub instructions: Vec<CompiledInstruction>,
}

/// `json` encoding yields bare strings, `jsonParsed` yields objects with a `pubkey`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AccountKey {
    Plain(String),
    Parsed { pubkey: String },
}

impl AccountKey {
    pub fn pubkey(&self) -> &str {
        match self {
            AccountKey::Plain(key) => key,
            AccountKey::Parsed { pubkey } => pubkey,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompiledInstruction {
    pub program_id_index: usize,
    #[serde(default, deserialize_with = "nullable")]
    pub accounts: Vec<usize>,
    #[serde(default, deserialize_with = "nullable")]
    pub data: String,
    #[serde(default)]
    pub stack_height: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InnerInstructions {
    pub index: usize,
    #[serde(default, deserialize_with = "nullable")]
    pub instructions: Vec<CompiledInstruction>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoadedAddresses {
    #[serde(default, deserialize_with = "nullable")]
    pub writable: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub readonly: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UiTokenAmount {
    #[serde(default, deserialize_with = "nullable")]
    pub amount: String,
    #[serde(default)]
    pub decimals: u8,
    #[serde(default)]
    pub ui_amount: Option<f64>,
    #[serde(default)]
    pub ui_amount_string: Option<String>,
}

impl UiTokenAmount {
    pub fn value(&self) -> f64 {
        self.ui_amount
            .or_else(|| {
                self.ui_amount_string
                    .as_deref()
                    .and_then(|s| s.parse::<f64>().ok())
            })
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub account_index: usize,
    pub mint: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub program_id: Option<String>,
    #[serde(default)]
    pub ui_token_amount: UiTokenAmount,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub fee: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub pre_balances: Vec<u64>,
    #[serde(default, deserialize_with = "nullable")]
    pub post_balances: Vec<u64>,
    #[serde(default, deserialize_with = "nullable")]
    pub pre_token_balances: Vec<TokenBalance>,
    #[serde(default, deserialize_with = "nullable")]
    pub post_token_balances: Vec<TokenBalance>,
    #[serde(default, deserialize_with = "nullable")]
    pub log_messages: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub inner_instructions: Vec<InnerInstructions>,
    #[serde(default, deserialize_with = "nullable")]
    pub loaded_addresses: LoadedAddresses,
    #[serde(default, deserialize_with = "nullable")]
    pub rewards: Vec<Value>,
}

impl TransactionMeta {
    /// Error text carried by the status metadata, if the transaction failed.
    pub fn error_message(&self) -> Option<String> {
        if let Some(err) = self.err.as_ref().filter(|e| !e.is_null()) {
            return Some(err.to_string());
        }
        let status = self.status.as_ref()?;
        ["Err", "error_message"]
            .iter()
            .filter_map(|key| status.get(*key))
            .find(|value| !value.is_null() && value.as_str() != Some(""))
            .map(|value| match value.as_str() {
                Some(text) => text.to_string(),
                None => value.to_string(),
            })
    }
}
