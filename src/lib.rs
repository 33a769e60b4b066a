//! FlowTrade-RS: natural-language trading workflows
//!
//! This crate turns a free-text strategy description into an executable
//! graph of triggers, trade actions, and notifications, then runs that
//! graph (once or on a timer) against a pluggable settlement provider.
//!
//! # Features
//!
//! - **Workflow Compiler**: deterministic text-to-graph compilation that
//!   never fails the request
//! - **Execution Engine**: one-shot and recurring interpretation with
//!   quote-denominated order sizing
//! - **Event Bus**: per-workflow publish/subscribe for live status streams
//! - **Provider Adapters**: paper trading and credential-gated exchange
//!   settlement behind one capability trait
//!
//! # Example
//!
//! ```no_run
//! use flowtrade_rs::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let workflow = compile("sell BTC at 50000 and email me at trader@example.com");
//!
//!     let bus = Arc::new(EventBus::new());
//!     let engine = ExecutionEngine::new(bus);
//!     let results = engine
//!         .execute(&workflow, ExecutionOptions::new(ProviderKind::Paper))
//!         .await;
//!
//!     println!("{}", serde_json::to_string_pretty(&results)?);
//!     Ok(())
//! }
//! ```

pub mod compiler;
pub mod config;
pub mod engine;
pub mod events;
pub mod exchange;
pub mod price;
pub mod workflow;

// Re-export commonly used types
pub mod prelude {
    pub use crate::compiler::{compile, WorkflowCompiler};
    pub use crate::config::EngineConfig;
    pub use crate::engine::{EngineError, EventCallback, ExecutionEngine, ExecutionOptions};
    pub use crate::events::{
        ActionStatus, EndReason, EventBus, EventKind, ExecutionMode, WorkflowEvent, GLOBAL_CHANNEL,
    };
    pub use crate::exchange::{
        adapter_for, format_symbol, BinanceAdapter, ExecutionResult, NotificationRequest,
        OrderRequest, PaperAdapter, ProviderAdapter, ProviderKind,
    };
    pub use crate::price::{PriceLookup, StaticPriceFeed, FALLBACK_QUOTE_PRICE};
    pub use crate::workflow::{
        Action, CompareOp, Edge, LoopControlAction, NotificationAction, NotifyChannel, OrderSide,
        PriceTrigger, TimerTrigger, TradeAction, Trigger, Workflow,
    };

    pub use anyhow::{Context, Result};
}

/// Result type alias
pub type Result<T> = anyhow::Result<T>;
