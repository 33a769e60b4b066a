//! Price lookup seam
//!
//! Quote-denominated order sizes need a live price to resolve into
//! base-asset units. The lookup is a collaborator behind a trait; the engine
//! tolerates it failing or returning nonsense by substituting a fixed
//! conservative price.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::Result;

/// Conservative price used when the lookup fails or returns a non-positive
/// value.
pub const FALLBACK_QUOTE_PRICE: f64 = 3000.0;

/// Collaborator contract for live price lookups.
#[async_trait]
pub trait PriceLookup: Send + Sync {
    /// Latest price for a `BASE-QUOTE` symbol.
    async fn get_price(&self, symbol: &str) -> Result<f64>;
}

/// In-memory price table. The engine's default is an empty table, which
/// forces every quote-sized order onto the fallback price; tests and demos
/// seed it with known quotes.
#[derive(Debug, Default)]
pub struct StaticPriceFeed {
    prices: HashMap<String, f64>,
}

impl StaticPriceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, symbol: impl Into<String>, price: f64) -> Self {
        self.prices.insert(symbol.into(), price);
        self
    }
}

#[async_trait]
impl PriceLookup for StaticPriceFeed {
    async fn get_price(&self, symbol: &str) -> Result<f64> {
        self.prices
            .get(symbol)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("no quote available for {}", symbol))
    }
}
