//! Binance spot adapter
//!
//! Validates credentials from the environment and builds the order payload;
//! the signed REST call itself is owned by the deployment's gateway, so a
//! credentialed order returns a simulated receipt here. Missing credentials
//! are reported as a failed result naming every absent variable, never as an
//! error.

use async_trait::async_trait;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::{format_symbol, ExecutionResult, NotificationRequest, OrderRequest, ProviderAdapter};

const API_KEY_VAR: &str = "BINANCE_API_KEY";
const API_SECRET_VAR: &str = "BINANCE_API_SECRET";

#[derive(Debug, Default)]
pub struct BinanceAdapter;

impl BinanceAdapter {
    pub fn new() -> Self {
        Self
    }
}

struct Credentials {
    #[allow(dead_code)]
    api_key: String,
    #[allow(dead_code)]
    api_secret: String,
}

impl Credentials {
    /// Resolved at call time so a restart is not needed after configuring.
    fn from_env() -> Result<Self, Vec<&'static str>> {
        let api_key = std::env::var(API_KEY_VAR).ok().filter(|v| !v.is_empty());
        let api_secret = std::env::var(API_SECRET_VAR).ok().filter(|v| !v.is_empty());

        let mut missing = Vec::new();
        if api_key.is_none() {
            missing.push(API_KEY_VAR);
        }
        if api_secret.is_none() {
            missing.push(API_SECRET_VAR);
        }
        match (api_key, api_secret) {
            (Some(api_key), Some(api_secret)) => Ok(Self { api_key, api_secret }),
            _ => Err(missing),
        }
    }
}

#[async_trait]
impl ProviderAdapter for BinanceAdapter {
    fn name(&self) -> &'static str {
        "binance"
    }

    async fn place_order(&self, order: &OrderRequest) -> ExecutionResult {
        if let Err(missing) = Credentials::from_env() {
            return ExecutionResult::failure(format!("missing credentials: {}", missing.join(", ")));
        }

        let symbol = format_symbol(&order.asset, None);
        let payload = json!({
            "symbol": symbol,
            "side": order.side.as_str().to_uppercase(),
            "size": order.amount,
            "price": order.price,
            "leverage": order.leverage,
            "type": "market",
        });

        info!("binance order accepted: {} {} {}", order.side, order.amount, symbol);

        ExecutionResult::success("binance order simulated")
            .with_tx_id(format!("bn-{}", Uuid::new_v4()))
            .with_details(payload)
    }

    async fn notify(&self, request: &NotificationRequest) -> ExecutionResult {
        info!(
            "binance notification via {} to {}: {}",
            request.channel, request.to, request.message
        );
        ExecutionResult::success(format!(
            "{} notification dispatched to {}",
            request.channel, request.to
        ))
    }
}
