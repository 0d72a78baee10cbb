//! Profit-and-loss maths over a token's swap history.
//!
//! The model is a single average-cost lot: every buy is pooled into one cost basis and
//! every sell is priced against that average. It does not track FIFO/LIFO lots, so
//! realized PnL differs from lot-based accounting whenever buy prices vary between sells.

pub mod trend;

use domain::{PnLReport, TokenSwap, TransactionType};
use tracing::debug;

pub use trend::{
    daily_change, daily_reference, monthly_change, monthly_reference, percent_change,
    value_on_day,
};

/// Computes cost basis and profit for one token from its swaps and current USD price.
///
/// Buys are measured on the `bought` leg and sells on the `sold` leg. A token without
/// buys has no cost basis, so every derived field stays at zero.
pub fn calculate_pnl(swaps: &[TokenSwap], current_price: f64) -> PnLReport {
    let mut report = PnLReport::default();

    for swap in swaps {
        match swap.transaction_type {
            TransactionType::Buy => {
                report.total_bought_usd += swap.bought.usd_amount;
                report.total_bought_amount += swap.bought.amount;
            }
            TransactionType::Sell => {
                report.total_sold_usd += swap.sold.usd_amount;
                report.total_sold_amount += swap.sold.amount;
            }
        }
    }

    if report.total_bought_amount > 0.0 {
        report.average_buy_price = report.total_bought_usd / report.total_bought_amount;

        if report.total_sold_amount > 0.0 {
            report.realized_pnl =
                report.total_sold_usd - report.total_sold_amount * report.average_buy_price;
        }

        report.remaining_amount = report.total_bought_amount - report.total_sold_amount;
        // over-sold positions carry no paper profit
        if report.remaining_amount > 0.0 {
            report.unrealized_pnl =
                (current_price - report.average_buy_price) * report.remaining_amount;
        }
    }

    report.total_pnl = report.realized_pnl + report.unrealized_pnl;

    debug!(
        swaps = swaps.len(),
        current_price,
        average_buy_price = report.average_buy_price,
        realized_pnl = report.realized_pnl,
        unrealized_pnl = report.unrealized_pnl,
        "pnl calculated"
    );

    report
}
