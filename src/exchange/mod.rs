//! Provider adapters: pluggable settlement backends
//!
//! The engine is adapter-agnostic: it only calls the `ProviderAdapter`
//! capability (`place_order`, optional `notify`). Adapters never propagate
//! errors for missing configuration or downstream rejections; they surface
//! them as failed `ExecutionResult`s so one bad action cannot abort its
//! siblings.

pub mod binance;
pub mod paper;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::workflow::{NotifyChannel, OrderSide};

pub use self::binance::BinanceAdapter;
pub use self::paper::PaperAdapter;

/// Outcome of one adapter call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ExecutionResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self { ok: true, message: Some(message.into()), tx_id: None, details: None }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { ok: false, message: Some(message.into()), tx_id: None, details: None }
    }

    pub fn with_tx_id(mut self, tx_id: impl Into<String>) -> Self {
        self.tx_id = Some(tx_id.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Order to be placed against a settlement backend
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub side: OrderSide,
    pub asset: String,
    pub amount: f64,
    pub price: Option<f64>,
    pub leverage: Option<u32>,
}

/// Notification to be delivered through the adapter's channel
#[derive(Debug, Clone)]
pub struct NotificationRequest {
    pub channel: NotifyChannel,
    pub to: String,
    pub message: String,
}

/// Capability contract every settlement backend implements once.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn place_order(&self, order: &OrderRequest) -> ExecutionResult;

    /// Optional capability; backends without a notification channel keep the
    /// default.
    async fn notify(&self, request: &NotificationRequest) -> ExecutionResult {
        ExecutionResult::failure(format!(
            "{} provider does not support notifications (channel: {})",
            self.name(),
            request.channel
        ))
    }
}

/// Supported settlement providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    Paper,
    Binance,
}

impl ProviderKind {
    /// Total mapping from provider name to kind: unrecognized names fall
    /// back to paper trading rather than failing the request.
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "paper" | "sim" => Self::Paper,
            "binance" | "binance_spot" => Self::Binance,
            other => {
                warn!("unknown provider '{}', falling back to paper trading", other);
                Self::Paper
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paper => "paper",
            Self::Binance => "binance",
        }
    }
}

/// Instantiate the adapter for a provider kind.
pub fn adapter_for(kind: ProviderKind) -> Arc<dyn ProviderAdapter> {
    match kind {
        ProviderKind::Paper => Arc::new(PaperAdapter::new()),
        ProviderKind::Binance => Arc::new(BinanceAdapter::new()),
    }
}

/// Format a `BASE-QUOTE` symbol; assets that already carry a quote pass
/// through unchanged.
pub fn format_symbol(asset: &str, quote: Option<&str>) -> String {
    if asset.contains('-') {
        asset.to_string()
    } else {
        format!("{}-{}", asset, quote.unwrap_or("USDC"))
    }
}
