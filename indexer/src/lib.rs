use async_trait::async_trait;
use domain::{PnLReport, RefreshSummary, TokenSwap, Wallet, WalletOverview};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("upstream request failed: {0}")]
    Upstream(String),
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
    #[error("inconsistent upstream data: {0}")]
    InconsistentData(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl IngestError {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        IngestError::NotFound {
            entity,
            key: key.into(),
        }
    }

    /// Upstream and storage failures may succeed on a later attempt; the rest will not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IngestError::Upstream(_) | IngestError::Persistence(_))
    }
}

impl From<anyhow::Error> for IngestError {
    fn from(err: anyhow::Error) -> Self {
        IngestError::Persistence(format!("{err:#}"))
    }
}

pub type IngestResult<T> = Result<T, IngestError>;

/// Raw upstream portfolio payload handed back to callers for further processing.
pub type RawPortfolio = serde_json::Value;

#[async_trait]
pub trait PortfolioService: Send + Sync {
    async fn reconcile_portfolio(
        &self,
        user_id: Uuid,
        wallet_address: &str,
        chain_id: &str,
    ) -> IngestResult<(Wallet, RawPortfolio)>;

    async fn ingest_swaps(
        &self,
        wallet_address: &str,
        chain_id: &str,
    ) -> IngestResult<Vec<TokenSwap>>;

    async fn token_pnl(&self, mint: &str) -> IngestResult<PnLReport>;

    async fn user_overview(&self, user_id: Uuid) -> IngestResult<WalletOverview>;

    async fn refresh_all(&self, wallets: Vec<Wallet>) -> IngestResult<RefreshSummary>;
}
