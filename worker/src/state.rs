use indexer::PortfolioService;
use sqlx::PgPool;
use std::sync::Arc;

use crate::{
    config::AppConfig,
    repositories::{PortfolioStore, SwapRepository, TokenRepository},
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: PgPool,
    pub portfolio: Arc<dyn PortfolioService>,
    pub store: Arc<dyn PortfolioStore>,
    pub tokens: Arc<dyn TokenRepository>,
    pub swaps: Arc<dyn SwapRepository>,
}

// Refresh tasks move clones of the state across threads.
#[allow(dead_code)]
fn _assert_state_bounds() {
    fn assert_bounds<T: Clone + Send + Sync + 'static>() {}
    assert_bounds::<AppState>();
}
