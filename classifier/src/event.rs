use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::raw::{InnerInstructions, TokenBalance};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Transfer,
    Swap,
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    Sent,
    Received,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
    None,
    Mixed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Completed,
    Pending,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstructionTransfer {
    pub program_id: String,
    pub direction: TransferDirection,
    pub instruction_data: String,
    pub involved_addresses: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SwapDetail {
    pub program_id: String,
    pub instruction_data: String,
    pub involved_addresses: Vec<String>,
    pub swapper: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransferDetail {
    pub token_mint: String,
    pub amount: f64,
    pub direction: TransferDirection,
    /// Counterparties are not recoverable from balance deltas alone.
    pub sender: Option<String>,
    pub recipient: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedEvent {
    pub signature: Option<String>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Signed lamport change for the address of interest.
    pub native_delta: i64,
    pub direction: Direction,
    pub status: TransactionStatus,
    pub transfers: Vec<InstructionTransfer>,
    pub swaps: Vec<SwapDetail>,
    pub fee: u64,
    pub logs: Vec<String>,
    pub token_transfers: Vec<TokenTransferDetail>,
    pub inner_instructions: Vec<InnerInstructions>,
    pub pre_token_balances: Vec<TokenBalance>,
    pub post_token_balances: Vec<TokenBalance>,
    pub rewards: Vec<Value>,
}
