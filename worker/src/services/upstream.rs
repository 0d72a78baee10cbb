use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use indexer::{IngestError, IngestResult, RawPortfolio};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT},
    Client, RequestBuilder,
};
use serde_json::{json, Value};
use tracing::warn;

use super::payload::TokenPrice;

/// Chain-indexing API consumed by the reconciler. Every call fails with
/// [`IngestError::Upstream`] on network errors, non-2xx answers, timeouts or bodies that
/// are not JSON.
#[async_trait]
pub trait PortfolioSource: Send + Sync {
    async fn fetch_portfolio(&self, address: &str) -> IngestResult<RawPortfolio>;
    /// One request for the whole set of mints.
    async fn fetch_prices(&self, mints: &[String]) -> IngestResult<Vec<TokenPrice>>;
    /// Raw swap entries, newest first.
    async fn fetch_swaps(&self, address: &str) -> IngestResult<Vec<Value>>;
}

#[derive(Clone)]
pub struct MoralisPortfolioSource {
    client: Client,
    api_base: String,
    network: String,
}

impl MoralisPortfolioSource {
    pub fn new(
        api_base: &str,
        api_key: &str,
        network: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if !api_key.is_empty() {
            let mut key = HeaderValue::from_str(api_key).context("invalid UPSTREAM_API_KEY")?;
            key.set_sensitive(true);
            headers.insert("X-API-Key", key);
        }
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("failed to build upstream http client")?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            network: network.to_string(),
        })
    }

    async fn send_json(&self, label: &str, request: RequestBuilder) -> IngestResult<Value> {
        let resp = request.send().await.map_err(|err| {
            let kind = if err.is_timeout() { "timed out" } else { "failed" };
            IngestError::Upstream(format!("{label} request {kind}: {err}"))
        })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(IngestError::Upstream(format!(
                "{label} returned status {status}"
            )));
        }
        resp.json::<Value>()
            .await
            .map_err(|err| IngestError::Upstream(format!("{label} returned malformed JSON: {err}")))
    }
}

#[async_trait]
impl PortfolioSource for MoralisPortfolioSource {
    async fn fetch_portfolio(&self, address: &str) -> IngestResult<RawPortfolio> {
        let url = format!(
            "{}/account/{}/{}/portfolio",
            self.api_base, self.network, address
        );
        self.send_json("portfolio", self.client.get(url)).await
    }

    async fn fetch_prices(&self, mints: &[String]) -> IngestResult<Vec<TokenPrice>> {
        if mints.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/token/{}/prices", self.api_base, self.network);
        let body = self
            .send_json(
                "prices",
                self.client.post(url).json(&json!({ "addresses": mints })),
            )
            .await?;
        let Value::Array(entries) = body else {
            return Err(IngestError::Upstream(
                "prices returned malformed JSON: expected an array".to_string(),
            ));
        };
        Ok(entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<TokenPrice>(entry) {
                Ok(price) => Some(price),
                Err(err) => {
                    warn!(error = %err, "skipping unreadable price entry");
                    None
                }
            })
            .collect())
    }

    async fn fetch_swaps(&self, address: &str) -> IngestResult<Vec<Value>> {
        let url = format!(
            "{}/account/{}/{}/swaps",
            self.api_base, self.network, address
        );
        let body = self
            .send_json("swaps", self.client.get(url).query(&[("order", "DESC")]))
            .await?;
        match body {
            Value::Object(mut map) => match map.remove("result") {
                Some(Value::Array(entries)) => Ok(entries),
                None | Some(Value::Null) => Ok(Vec::new()),
                Some(_) => Err(IngestError::Upstream(
                    "swaps returned malformed JSON: `result` is not an array".to_string(),
                )),
            },
            _ => Err(IngestError::Upstream(
                "swaps returned malformed JSON: expected an object".to_string(),
            )),
        }
    }
}
