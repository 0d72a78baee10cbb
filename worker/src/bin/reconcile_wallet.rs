use std::env;

use anyhow::{anyhow, bail};
use indexer::PortfolioService;
use uuid::Uuid;
use worker::{
    bootstrap::build_state, config::AppConfig, repositories::PortfolioStore, telemetry,
};

const USAGE: &str = "usage: reconcile_wallet <user_id> <address> <chain_id> [--swaps]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing()?;

    let mut args = env::args().skip(1);
    let user_id = args.next().ok_or_else(|| anyhow!(USAGE))?;
    let user_id =
        Uuid::parse_str(&user_id).map_err(|_| anyhow!("invalid user id: {user_id}"))?;
    let address = args.next().ok_or_else(|| anyhow!(USAGE))?;
    let chain_id = args.next().ok_or_else(|| anyhow!(USAGE))?;
    let with_swaps = match args.next().as_deref() {
        None => false,
        Some("--swaps") => true,
        Some(other) => bail!("unexpected argument {other}\n{USAGE}"),
    };

    let config = AppConfig::from_env()?;
    let state = build_state(&config, None).await?;

    let (wallet, _raw) = state
        .portfolio
        .reconcile_portfolio(user_id, &address, &chain_id)
        .await?;
    println!("{}", serde_json::to_string_pretty(&wallet)?);

    let holdings = state.store.holdings_for_wallet(wallet.id).await?;
    println!("holdings: {}", holdings.len());

    if with_swaps {
        let swaps = state.portfolio.ingest_swaps(&address, &chain_id).await?;
        println!("swaps ingested: {}", swaps.len());
        let mut mints: Vec<String> = Vec::new();
        for swap in &swaps {
            if !mints.contains(&swap.base_token) {
                mints.push(swap.base_token.clone());
            }
        }
        for mint in mints {
            let report = state.portfolio.token_pnl(&mint).await?;
            println!(
                "{mint}: avg_buy={:.6} realized={:.2} unrealized={:.2} total={:.2}",
                report.average_buy_price,
                report.realized_pnl,
                report.unrealized_pnl,
                report.total_pnl
            );
        }
    }

    Ok(())
}
