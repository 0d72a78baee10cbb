pub mod orchestrator;
pub mod payload;
pub mod portfolio;
pub mod reconciler;
pub mod swaps;
pub mod upstream;

pub use orchestrator::{refresh_with_retry, RetryPolicy};
pub use payload::{PortfolioPayload, TokenPrice};
pub use portfolio::{DbPortfolioService, RefreshOptions};
pub use upstream::{MoralisPortfolioSource, PortfolioSource};
