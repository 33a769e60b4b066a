//! Paper trading adapter: simulated fills, no credentials required
//!
//! Default provider. Orders fill instantly with a synthetic transaction id;
//! notifications are logged and acknowledged.

use async_trait::async_trait;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::{format_symbol, ExecutionResult, NotificationRequest, OrderRequest, ProviderAdapter};

#[derive(Debug, Default)]
pub struct PaperAdapter;

impl PaperAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProviderAdapter for PaperAdapter {
    fn name(&self) -> &'static str {
        "paper"
    }

    async fn place_order(&self, order: &OrderRequest) -> ExecutionResult {
        let symbol = format_symbol(&order.asset, None);
        info!(
            "📊 paper fill: {} {} {} ({})",
            order.side.as_str().to_uppercase(),
            order.amount,
            order.asset,
            symbol
        );

        ExecutionResult::success("paper order filled")
            .with_tx_id(format!("paper-{}", Uuid::new_v4()))
            .with_details(json!({
                "symbol": symbol,
                "side": order.side.as_str().to_uppercase(),
                "size": order.amount,
                "price": order.price,
                "leverage": order.leverage,
                "type": "market",
            }))
    }

    async fn notify(&self, request: &NotificationRequest) -> ExecutionResult {
        info!(
            "📧 paper notification via {} to {}: {}",
            request.channel, request.to, request.message
        );
        ExecutionResult::success(format!(
            "{} notification dispatched to {}",
            request.channel, request.to
        ))
    }
}
