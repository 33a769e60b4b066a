//! Engine configuration
//!
//! Resolved once from the environment (a `.env` file is honored). Every
//! field has a default, so construction never fails.

use dotenv::dotenv;

use crate::exchange::ProviderKind;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Safeguard for recurring workflows: stop after this many firings.
    /// `None` leaves the timer unbounded until an explicit stop.
    pub max_iterations: Option<u32>,
    /// Provider used when the caller does not name one.
    pub default_provider: ProviderKind,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_iterations: None, default_provider: ProviderKind::Paper }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        dotenv().ok();

        let max_iterations = std::env::var("TRADING_MAX_ITER")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|n| *n > 0);

        let default_provider = ProviderKind::from_name(
            &std::env::var("TRADING_PROVIDER").unwrap_or_else(|_| "paper".to_string()),
        );

        Self { max_iterations, default_provider }
    }
}
