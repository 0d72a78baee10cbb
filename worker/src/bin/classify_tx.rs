use std::{env, fs};

use anyhow::{anyhow, Context};
use classifier::{classify, RawTransaction};
use serde_json::Value;

const USAGE: &str = "usage: classify_tx <transaction.json> <address>";

/// Accepts a bare transaction or a full JSON-RPC response with a `result` field.
fn parse_transaction(body: &str) -> anyhow::Result<RawTransaction> {
    let mut value: Value = serde_json::from_str(body).context("file is not valid JSON")?;
    if let Some(result) = value.get_mut("result").map(Value::take) {
        value = result;
    }
    if value.is_null() {
        return Err(anyhow!("transaction not found in response"));
    }
    serde_json::from_value(value).context("unrecognised transaction shape")
}

fn main() -> anyhow::Result<()> {
    let mut args = env::args().skip(1);
    let path = args.next().ok_or_else(|| anyhow!(USAGE))?;
    let address = args.next().ok_or_else(|| anyhow!(USAGE))?;

    let body = fs::read_to_string(&path).with_context(|| format!("failed to read {path}"))?;
    let tx = parse_transaction(&body)?;
    let event = classify(&tx, &address);
    println!("{}", serde_json::to_string_pretty(&event)?);
    Ok(())
}
