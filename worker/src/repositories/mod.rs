pub mod memory;
pub mod portfolio_store;
pub mod swap_repository;
pub mod token_repository;

pub use memory::InMemoryStore;
pub use portfolio_store::{
    HoldingUpsert, PortfolioStore, PostgresPortfolioStore, ReconciliationPlan,
    StaleHoldingPolicy, WalletUpsert,
};
pub use swap_repository::{PostgresSwapRepository, SwapRecord, SwapRepository};
pub use token_repository::{PostgresTokenRepository, TokenRepository};
