use std::{env, time::Duration};

use anyhow::{Context, Result};

use crate::repositories::StaleHoldingPolicy;

pub const DEFAULT_UPSTREAM_API_BASE: &str = "https://solana-gateway.moralis.io";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub upstream_api_base: String,
    pub upstream_api_key: String,
    pub upstream_network: String,
    pub upstream_timeout: Duration,
    pub refresh_interval: Duration,
    pub refresh_max_concurrency: usize,
    pub refresh_max_attempts: usize,
    pub refresh_backoff: Duration,
    pub refresh_ingest_swaps: bool,
    pub stale_holding_policy: StaleHoldingPolicy,
    pub metrics_port: Option<u16>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let stale_holding_policy = match env::var("STALE_HOLDING_POLICY") {
            Ok(raw) => raw
                .parse()
                .context("STALE_HOLDING_POLICY must be `zero` or `delete`")?,
            Err(_) => StaleHoldingPolicy::default(),
        };
        let metrics_port = match env::var("METRICS_PORT") {
            Ok(raw) => Some(
                raw.trim()
                    .parse()
                    .context("METRICS_PORT must be a valid u16")?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .context("DATABASE_URL must be set for the refresh worker")?,
            upstream_api_base: env::var("UPSTREAM_API_BASE")
                .unwrap_or_else(|_| DEFAULT_UPSTREAM_API_BASE.to_string()),
            upstream_api_key: env::var("UPSTREAM_API_KEY").unwrap_or_default(),
            upstream_network: env::var("UPSTREAM_NETWORK")
                .unwrap_or_else(|_| "mainnet".to_string()),
            upstream_timeout: parse_duration_seconds("UPSTREAM_TIMEOUT_SECS", 15),
            refresh_interval: parse_duration_seconds("REFRESH_INTERVAL_SECS", 900),
            refresh_max_concurrency: parse_usize("REFRESH_MAX_CONCURRENCY", 4),
            refresh_max_attempts: parse_usize("REFRESH_MAX_ATTEMPTS", 3),
            refresh_backoff: parse_duration_seconds("REFRESH_BACKOFF_SECS", 60),
            refresh_ingest_swaps: parse_bool("REFRESH_INGEST_SWAPS", true),
            stale_holding_policy,
            metrics_port,
        })
    }
}

fn parse_duration_seconds(key: &str, default: u64) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default))
}

fn parse_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes" | "on"))
        .unwrap_or(default)
}
