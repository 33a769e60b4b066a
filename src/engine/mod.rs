//! Workflow execution engine
//!
//! Interprets a compiled `Workflow` against a provider adapter. One-shot
//! workflows run their action chain synchronously and return every result;
//! recurring workflows (a timer trigger with a positive interval) are
//! scheduled onto an independent tokio task and acknowledge immediately;
//! every further outcome is visible only through the event bus.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::events::{ActionStatus, EndReason, EventBus, ExecutionMode, WorkflowEvent};
use crate::exchange::{
    adapter_for, format_symbol, ExecutionResult, NotificationRequest, OrderRequest,
    ProviderAdapter, ProviderKind,
};
use crate::price::{PriceLookup, StaticPriceFeed, FALLBACK_QUOTE_PRICE};
use crate::workflow::{Action, TradeAction, Workflow};

/// Callback invoked inline for every emitted event, ahead of the bus.
pub type EventCallback = Arc<dyn Fn(&WorkflowEvent) + Send + Sync>;

/// Errors produced by workflow validation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The graph synthesizer guarantees this for compiled workflows; hand-
    /// built graphs can still violate it.
    #[error("invalid workflow: requires at least one trigger and one action")]
    MissingStructure,
}

/// Per-execution options.
#[derive(Clone, Default)]
pub struct ExecutionOptions {
    provider: ProviderKind,
    adapter: Option<Arc<dyn ProviderAdapter>>,
    on_event: Option<EventCallback>,
    max_iterations: Option<u32>,
}

impl ExecutionOptions {
    pub fn new(provider: ProviderKind) -> Self {
        Self { provider, adapter: None, on_event: None, max_iterations: None }
    }

    /// Use a specific adapter instance instead of the named provider.
    pub fn with_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn with_on_event(mut self, on_event: EventCallback) -> Self {
        self.on_event = Some(on_event);
        self
    }

    /// Explicit iteration safeguard for the recurring path.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    fn resolve_adapter(&self) -> Arc<dyn ProviderAdapter> {
        self.adapter.clone().unwrap_or_else(|| adapter_for(self.provider))
    }
}

/// Bookkeeping for one live recurring workflow.
struct RunningWorkflow {
    handle: JoinHandle<()>,
    started_at: DateTime<Utc>,
}

/// Fans one event out to the optional inline callback and the bus.
#[derive(Clone)]
struct EventSink {
    bus: Arc<EventBus>,
    on_event: Option<EventCallback>,
}

impl EventSink {
    async fn emit(&self, event: WorkflowEvent) {
        if let Some(on_event) = &self.on_event {
            on_event(&event);
        }
        self.bus.publish(event).await;
    }
}

/// Stateless orchestrator plus the registry of live recurring workflows.
pub struct ExecutionEngine {
    bus: Arc<EventBus>,
    prices: Arc<dyn PriceLookup>,
    config: EngineConfig,
    running: Arc<RwLock<HashMap<String, RunningWorkflow>>>,
}

impl ExecutionEngine {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            prices: Arc::new(StaticPriceFeed::new()),
            config: EngineConfig::default(),
            running: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_price_feed(mut self, prices: Arc<dyn PriceLookup>) -> Self {
        self.prices = prices;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bus(&self) -> Arc<EventBus> {
        self.bus.clone()
    }

    /// Execute a workflow. One-shot workflows return one result per action
    /// attempted; recurring workflows return a single immediate
    /// acknowledgement and report through the bus from then on.
    pub async fn execute(&self, workflow: &Workflow, options: ExecutionOptions) -> Vec<ExecutionResult> {
        if !workflow.has_structure() {
            warn!("rejected workflow {}: missing triggers or actions", workflow.id);
            return vec![ExecutionResult::failure(EngineError::MissingStructure.to_string())];
        }

        let adapter = options.resolve_adapter();
        let sink = EventSink { bus: self.bus.clone(), on_event: options.on_event.clone() };

        match workflow.timer().filter(|t| t.interval_secs > 0) {
            Some(timer) => {
                let cap = options.max_iterations.or(self.config.max_iterations);
                self.start_recurring(workflow, timer.interval_secs, adapter, sink, cap).await
            }
            None => Self::run_oneshot(workflow, adapter, sink, self.prices.clone()).await,
        }
    }

    /// Stop a recurring workflow. Only future firings are prevented; an
    /// order already dispatched to the adapter is not cancelled.
    pub async fn stop(&self, workflow_id: &str) -> bool {
        match self.running.write().await.remove(workflow_id) {
            Some(running) => {
                running.handle.abort();
                self.bus
                    .publish(WorkflowEvent::end(workflow_id, Some(EndReason::Stopped)))
                    .await;
                info!("🛑 stopped recurring workflow {}", workflow_id);
                true
            }
            None => false,
        }
    }

    pub async fn is_running(&self, workflow_id: &str) -> bool {
        self.running.read().await.contains_key(workflow_id)
    }

    pub async fn active_count(&self) -> usize {
        self.running.read().await.len()
    }

    /// When the workflow's timer was scheduled, if it is still live.
    pub async fn running_since(&self, workflow_id: &str) -> Option<DateTime<Utc>> {
        self.running.read().await.get(workflow_id).map(|r| r.started_at)
    }

    async fn run_oneshot(
        workflow: &Workflow,
        adapter: Arc<dyn ProviderAdapter>,
        sink: EventSink,
        prices: Arc<dyn PriceLookup>,
    ) -> Vec<ExecutionResult> {
        sink.emit(WorkflowEvent::start(&workflow.id, ExecutionMode::Oneshot, None)).await;

        let mut results = Vec::new();
        for action in &workflow.actions {
            match action {
                Action::Trade(trade) => {
                    sink.emit(WorkflowEvent::action(
                        &workflow.id,
                        &trade.id,
                        ActionStatus::Placing,
                        None,
                        None,
                    ))
                    .await;

                    let amount = resolve_order_amount(prices.as_ref(), trade).await;
                    let order = OrderRequest {
                        side: trade.side,
                        asset: trade.asset.clone(),
                        amount,
                        price: None,
                        leverage: trade.leverage,
                    };
                    let result = adapter.place_order(&order).await;

                    let status = if result.ok { ActionStatus::Placed } else { ActionStatus::Failed };
                    sink.emit(WorkflowEvent::action(
                        &workflow.id,
                        &trade.id,
                        status,
                        None,
                        Some(result.clone()),
                    ))
                    .await;
                    results.push(result);
                }
                Action::Notification(notification) => {
                    sink.emit(WorkflowEvent::action(
                        &workflow.id,
                        &notification.id,
                        ActionStatus::Sending,
                        None,
                        None,
                    ))
                    .await;

                    let request = NotificationRequest {
                        channel: notification.channel,
                        to: notification.to.clone(),
                        message: notification
                            .message
                            .clone()
                            .unwrap_or_else(|| "Trade executed successfully".to_string()),
                    };
                    let result = adapter.notify(&request).await;

                    let status = if result.ok { ActionStatus::Sent } else { ActionStatus::Failed };
                    sink.emit(WorkflowEvent::action(
                        &workflow.id,
                        &notification.id,
                        status,
                        None,
                        Some(result.clone()),
                    ))
                    .await;
                    results.push(result);
                }
                // Cycle marker; nothing to attempt.
                Action::LoopControl(_) => {}
            }
        }

        sink.emit(WorkflowEvent::end(&workflow.id, None)).await;
        results
    }

    async fn start_recurring(
        &self,
        workflow: &Workflow,
        interval_secs: u64,
        adapter: Arc<dyn ProviderAdapter>,
        sink: EventSink,
        max_iterations: Option<u32>,
    ) -> Vec<ExecutionResult> {
        sink.emit(WorkflowEvent::start(&workflow.id, ExecutionMode::Timer, Some(interval_secs)))
            .await;

        let wf = workflow.clone();
        let prices = self.prices.clone();
        let running = self.running.clone();

        let handle = tokio::spawn(async move {
            let mut timer = interval(Duration::from_secs(interval_secs.max(1)));
            timer.tick().await; // the first tick completes immediately; skip it
            let mut iteration: u64 = 0;

            loop {
                timer.tick().await;
                iteration += 1;

                for action in &wf.actions {
                    let Action::Trade(trade) = action else { continue };

                    sink.emit(WorkflowEvent::action(
                        &wf.id,
                        &trade.id,
                        ActionStatus::Placing,
                        Some(iteration),
                        None,
                    ))
                    .await;

                    let amount = resolve_order_amount(prices.as_ref(), trade).await;
                    let order = OrderRequest {
                        side: trade.side,
                        asset: trade.asset.clone(),
                        amount,
                        price: None,
                        leverage: trade.leverage,
                    };
                    let result = adapter.place_order(&order).await;

                    // Failures never halt the timer.
                    if !result.ok {
                        warn!(
                            "iteration {} of {} failed: {}",
                            iteration,
                            wf.id,
                            result.message.as_deref().unwrap_or("unknown")
                        );
                    }
                    let status = if result.ok { ActionStatus::Placed } else { ActionStatus::Failed };
                    sink.emit(WorkflowEvent::action(
                        &wf.id,
                        &trade.id,
                        status,
                        Some(iteration),
                        Some(result),
                    ))
                    .await;
                }

                if let Some(cap) = max_iterations {
                    if iteration >= u64::from(cap) {
                        running.write().await.remove(&wf.id);
                        info!("🛑 recurring workflow {} reached its iteration cap ({})", wf.id, cap);
                        sink.emit(WorkflowEvent::end(&wf.id, Some(EndReason::MaxIterations))).await;
                        break;
                    }
                }
            }
        });

        self.running
            .write()
            .await
            .insert(workflow.id.clone(), RunningWorkflow { handle, started_at: Utc::now() });

        info!("✅ started recurring workflow {} ({}s interval)", workflow.id, interval_secs);
        vec![ExecutionResult::success("timer strategy started")]
    }
}

/// Effective order size for a trade action. Quote-denominated sizes resolve
/// against the live price of `ASSET-QUOTE`; lookup failure falls back to a
/// fixed conservative price instead of aborting the iteration.
async fn resolve_order_amount(prices: &dyn PriceLookup, trade: &TradeAction) -> f64 {
    let Some(quote_amount) = trade.quote_amount.filter(|q| *q > 0.0) else {
        return trade.amount;
    };

    let quote = trade.quote_asset.as_deref().unwrap_or("USDC");
    let symbol = format_symbol(&trade.asset, Some(quote));

    match prices.get_price(&symbol).await {
        Ok(price) if price > 0.0 => quote_amount / price,
        Ok(price) => {
            warn!("non-positive price {} for {}, using fallback", price, symbol);
            quote_amount / FALLBACK_QUOTE_PRICE
        }
        Err(err) => {
            warn!("price lookup failed for {}: {}, using fallback", symbol, err);
            quote_amount / FALLBACK_QUOTE_PRICE
        }
    }
}
