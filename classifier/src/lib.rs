//! Turns raw ledger transactions into semantic transfer/swap events for one address.
//!
//! Classification is heuristic: the raw record carries no authoritative event type, so the
//! instruction list, the log lines and the balance deltas are inspected in that order.

pub mod event;
pub mod programs;
pub mod raw;

use std::sync::OnceLock;

pub use event::{
    ClassifiedEvent, Direction, EventType, InstructionTransfer, SwapDetail, TokenTransferDetail,
    TransactionStatus, TransferDirection,
};
pub use programs::ProgramRegistry;
pub use raw::RawTransaction;

use raw::TransactionMeta;

static DEFAULT_REGISTRY: OnceLock<ProgramRegistry> = OnceLock::new();

/// Classifies `tx` from the point of view of `address` using the built-in program lists.
pub fn classify(tx: &RawTransaction, address: &str) -> ClassifiedEvent {
    DEFAULT_REGISTRY
        .get_or_init(ProgramRegistry::default)
        .classify(tx, address)
}

impl ProgramRegistry {
    pub fn classify(&self, tx: &RawTransaction, address: &str) -> ClassifiedEvent {
        let keys = tx.account_keys();
        let mut event = ClassifiedEvent {
            signature: tx.signature().map(str::to_string),
            event_type: EventType::Unknown,
            native_delta: 0,
            direction: Direction::None,
            status: transaction_status(tx),
            transfers: Vec::new(),
            swaps: Vec::new(),
            fee: tx.meta.fee,
            logs: tx.meta.log_messages.clone(),
            token_transfers: Vec::new(),
            inner_instructions: tx.meta.inner_instructions.clone(),
            pre_token_balances: tx.meta.pre_token_balances.clone(),
            post_token_balances: tx.meta.post_token_balances.clone(),
            rewards: tx.meta.rewards.clone(),
        };

        // not a participant: nothing moved for this address
        let Some(index) = keys.iter().position(|key| *key == address) else {
            return event;
        };
        event.native_delta = native_delta(&tx.meta, index);

        for instruction in &tx.transaction.message.instructions {
            let Some(program_id) = keys.get(instruction.program_id_index) else {
                continue;
            };
            let involved: Vec<String> = instruction
                .accounts
                .iter()
                .filter_map(|idx| keys.get(*idx))
                .map(|key| key.to_string())
                .collect();

            if let Some(swapper) = self.swapper(program_id) {
                event.event_type = EventType::Swap;
                event.swaps.push(SwapDetail {
                    program_id: program_id.to_string(),
                    instruction_data: instruction.data.clone(),
                    involved_addresses: involved,
                    swapper: swapper.to_string(),
                });
            } else if self.is_transfer_program(program_id)
                && involved.iter().any(|account| account == address)
            {
                if event.event_type == EventType::Unknown {
                    event.event_type = EventType::Transfer;
                }
                let direction = if involved.first().map(String::as_str) == Some(address) {
                    TransferDirection::Sent
                } else {
                    TransferDirection::Received
                };
                event.transfers.push(InstructionTransfer {
                    program_id: program_id.to_string(),
                    direction,
                    instruction_data: instruction.data.clone(),
                    involved_addresses: involved,
                });
            }
        }

        if event.event_type == EventType::Unknown {
            event.event_type = type_from_logs(&tx.meta.log_messages);
        }

        event.token_transfers = token_transfers(&tx.meta, address);
        event.direction = overall_direction(event.native_delta, &event.token_transfers);
        event
    }
}

fn native_delta(meta: &TransactionMeta, index: usize) -> i64 {
    let pre = meta.pre_balances.get(index).copied().unwrap_or(0);
    let post = meta.post_balances.get(index).copied().unwrap_or(0);
    post as i64 - pre as i64
}

/// Any line mentioning a swap beats any line mentioning a transfer.
fn type_from_logs(logs: &[String]) -> EventType {
    let lines: Vec<String> = logs.iter().map(|line| line.to_lowercase()).collect();
    if lines.iter().any(|line| line.contains("swap")) {
        EventType::Swap
    } else if lines.iter().any(|line| line.contains("transfer")) {
        EventType::Transfer
    } else {
        EventType::Unknown
    }
}

fn token_transfers(meta: &TransactionMeta, address: &str) -> Vec<TokenTransferDetail> {
    // first-seen order of mints keeps the output stable
    let mut deltas: Vec<(String, f64)> = Vec::new();
    let mut apply = |mint: &str, amount: f64| {
        match deltas.iter_mut().find(|(m, _)| m == mint) {
            Some((_, delta)) => *delta += amount,
            None => deltas.push((mint.to_string(), amount)),
        }
    };

    for balance in &meta.pre_token_balances {
        if balance.owner.as_deref() == Some(address) {
            apply(&balance.mint, -balance.ui_token_amount.value());
        }
    }
    for balance in &meta.post_token_balances {
        if balance.owner.as_deref() == Some(address) {
            apply(&balance.mint, balance.ui_token_amount.value());
        }
    }

    deltas
        .into_iter()
        .filter(|(_, delta)| *delta != 0.0)
        .map(|(mint, delta)| {
            let received = delta > 0.0;
            TokenTransferDetail {
                token_mint: mint,
                amount: delta.abs(),
                direction: if received {
                    TransferDirection::Received
                } else {
                    TransferDirection::Sent
                },
                sender: (!received).then(|| address.to_string()),
                recipient: received.then(|| address.to_string()),
            }
        })
        .collect()
}

fn overall_direction(native_delta: i64, details: &[TokenTransferDetail]) -> Direction {
    if native_delta > 0 {
        return Direction::Received;
    }
    if native_delta < 0 {
        return Direction::Sent;
    }
    let mut directions = details.iter().map(|detail| detail.direction);
    let Some(first) = directions.next() else {
        return Direction::None;
    };
    if directions.all(|direction| direction == first) {
        first.into()
    } else {
        Direction::Mixed
    }
}

impl From<TransferDirection> for Direction {
    fn from(direction: TransferDirection) -> Self {
        match direction {
            TransferDirection::Sent => Direction::Sent,
            TransferDirection::Received => Direction::Received,
        }
    }
}

fn transaction_status(tx: &RawTransaction) -> TransactionStatus {
    if tx.meta.error_message().is_some() {
        TransactionStatus::Error
    } else if tx.block_time.is_some() {
        TransactionStatus::Completed
    } else {
        TransactionStatus::Pending
    }
}
