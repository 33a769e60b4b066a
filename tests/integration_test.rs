//! Integration tests for the execution engine and event bus

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::time::{advance, timeout, Duration};

use flowtrade_rs::compiler::compile;
use flowtrade_rs::engine::{ExecutionEngine, ExecutionOptions};
use flowtrade_rs::events::{ActionStatus, EndReason, EventBus, EventKind, ExecutionMode, WorkflowEvent};
use flowtrade_rs::exchange::{
    ExecutionResult, NotificationRequest, OrderRequest, ProviderAdapter, ProviderKind,
};
use flowtrade_rs::price::{StaticPriceFeed, FALLBACK_QUOTE_PRICE};
use flowtrade_rs::workflow::{
    Action, CompareOp, Edge, NotificationAction, NotifyChannel, OrderSide, PriceTrigger,
    TimerTrigger, TradeAction, Trigger, Workflow,
};

/// Adapter that rejects every order.
struct FailingAdapter {
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl ProviderAdapter for FailingAdapter {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn place_order(&self, _order: &OrderRequest) -> ExecutionResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ExecutionResult::failure("exchange rejected order")
    }
}

/// Adapter that records every order it fills.
struct RecordingAdapter {
    orders: Arc<Mutex<Vec<OrderRequest>>>,
}

#[async_trait]
impl ProviderAdapter for RecordingAdapter {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn place_order(&self, order: &OrderRequest) -> ExecutionResult {
        self.orders.lock().expect("orders lock").push(order.clone());
        ExecutionResult::success("filled").with_tx_id("mock-tx")
    }

    async fn notify(&self, _request: &NotificationRequest) -> ExecutionResult {
        ExecutionResult::success("notified")
    }
}

/// One price trigger wired to one sell; no notification node, so the
/// one-shot result list has exactly one entry.
fn single_trade_workflow(id: &str) -> Workflow {
    Workflow {
        id: id.to_string(),
        name: "sell btc".to_string(),
        triggers: vec![Trigger::Price(PriceTrigger {
            id: "t1".to_string(),
            asset: "BTC".to_string(),
            operator: CompareOp::Gte,
            threshold: 50000.0,
        })],
        actions: vec![Action::Trade(TradeAction::new("a1", OrderSide::Sell, "BTC", 1.0))],
        edges: vec![Edge::new("t1", "a1")],
    }
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<WorkflowEvent>) -> Vec<WorkflowEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

async fn recv(rx: &mut tokio::sync::broadcast::Receiver<WorkflowEvent>) -> WorkflowEvent {
    timeout(Duration::from_secs(120), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

#[tokio::test]
async fn test_one_shot_failure_event_sequence() {
    let bus = Arc::new(EventBus::new());
    let engine = ExecutionEngine::new(bus.clone());
    let workflow = single_trade_workflow("wf-fail-1");
    let mut rx = bus.subscribe(&workflow.id).await;

    let calls = Arc::new(AtomicU32::new(0));
    let options = ExecutionOptions::new(ProviderKind::Paper)
        .with_adapter(Arc::new(FailingAdapter { calls: calls.clone() }));

    let results = engine.execute(&workflow, options).await;

    assert_eq!(results.len(), 1);
    assert!(!results[0].ok);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let events = drain(&mut rx);
    let shape: Vec<(EventKind, Option<ActionStatus>)> =
        events.iter().map(|e| (e.kind, e.status)).collect();
    assert_eq!(
        shape,
        vec![
            (EventKind::Start, None),
            (EventKind::Action, Some(ActionStatus::Placing)),
            (EventKind::Action, Some(ActionStatus::Failed)),
            (EventKind::End, None),
        ]
    );
    assert_eq!(events[0].mode, Some(ExecutionMode::Oneshot));
    assert_eq!(events[2].result.as_ref().map(|r| r.ok), Some(false));
}

#[tokio::test]
async fn test_one_shot_trade_and_notification_results() {
    let bus = Arc::new(EventBus::new());
    let engine = ExecutionEngine::new(bus.clone());
    let workflow = compile("sell BTC at 50000");
    let mut rx = bus.subscribe(&workflow.id).await;

    let results = engine
        .execute(&workflow, ExecutionOptions::new(ProviderKind::Paper))
        .await;

    // One trade plus the always-present notification.
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.ok));
    assert!(results[0].tx_id.as_deref().unwrap_or("").starts_with("paper-"));

    let statuses: Vec<Option<ActionStatus>> = drain(&mut rx).iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![
            None,
            Some(ActionStatus::Placing),
            Some(ActionStatus::Placed),
            Some(ActionStatus::Sending),
            Some(ActionStatus::Sent),
            None,
        ]
    );
}

#[tokio::test]
async fn test_structural_error_is_a_single_failed_result() {
    let bus = Arc::new(EventBus::new());
    let engine = ExecutionEngine::new(bus.clone());

    let mut workflow = single_trade_workflow("wf-empty-1");
    workflow.actions.clear();
    workflow.edges.clear();
    let mut rx = bus.subscribe(&workflow.id).await;

    let results = engine
        .execute(&workflow, ExecutionOptions::new(ProviderKind::Paper))
        .await;

    assert_eq!(results.len(), 1);
    assert!(!results[0].ok);
    assert!(results[0]
        .message
        .as_deref()
        .unwrap_or("")
        .contains("at least one trigger"));
    // No events for structural failures.
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_recurring_failures_do_not_halt_the_timer() {
    let bus = Arc::new(EventBus::new());
    let engine = ExecutionEngine::new(bus.clone());
    let workflow = compile("buy 10 ADA every 5 seconds and email me");
    let mut rx = bus.subscribe(&workflow.id).await;

    let calls = Arc::new(AtomicU32::new(0));
    let options = ExecutionOptions::new(ProviderKind::Paper)
        .with_adapter(Arc::new(FailingAdapter { calls: calls.clone() }))
        .with_max_iterations(3);

    let ack = engine.execute(&workflow, options).await;
    assert_eq!(ack.len(), 1);
    assert!(ack[0].ok);
    assert_eq!(ack[0].message.as_deref(), Some("timer strategy started"));
    assert!(engine.is_running(&workflow.id).await);

    let start = recv(&mut rx).await;
    assert_eq!(start.kind, EventKind::Start);
    assert_eq!(start.mode, Some(ExecutionMode::Timer));
    assert_eq!(start.interval_secs, Some(5));

    // Three firings despite every order failing.
    for iteration in 1..=3u64 {
        let placing = recv(&mut rx).await;
        assert_eq!(placing.status, Some(ActionStatus::Placing));
        assert_eq!(placing.iteration, Some(iteration));

        let failed = recv(&mut rx).await;
        assert_eq!(failed.status, Some(ActionStatus::Failed));
        assert_eq!(failed.iteration, Some(iteration));
    }

    let end = recv(&mut rx).await;
    assert_eq!(end.kind, EventKind::End);
    assert_eq!(end.reason, Some(EndReason::MaxIterations));

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(!engine.is_running(&workflow.id).await);
}

#[tokio::test(start_paused = true)]
async fn test_stop_prevents_future_firings() {
    let bus = Arc::new(EventBus::new());
    let engine = ExecutionEngine::new(bus.clone());
    let workflow = compile("buy 10 ADA every 5 seconds and email me");
    let mut rx = bus.subscribe(&workflow.id).await;

    let calls = Arc::new(AtomicU32::new(0));
    let options = ExecutionOptions::new(ProviderKind::Paper)
        .with_adapter(Arc::new(FailingAdapter { calls: calls.clone() }));

    engine.execute(&workflow, options).await;
    assert!(engine.running_since(&workflow.id).await.is_some());

    // Let the first iteration happen.
    let start = recv(&mut rx).await;
    assert_eq!(start.kind, EventKind::Start);
    let placing = recv(&mut rx).await;
    assert_eq!(placing.status, Some(ActionStatus::Placing));
    let failed = recv(&mut rx).await;
    assert_eq!(failed.status, Some(ActionStatus::Failed));

    assert!(engine.stop(&workflow.id).await);
    assert!(!engine.is_running(&workflow.id).await);
    // Stopping twice is a no-op.
    assert!(!engine.stop(&workflow.id).await);

    let end = recv(&mut rx).await;
    assert_eq!(end.kind, EventKind::End);
    assert_eq!(end.reason, Some(EndReason::Stopped));

    // The timer is dead: no further firings arrive.
    let calls_at_stop = calls.load(Ordering::SeqCst);
    advance(Duration::from_secs(30)).await;
    assert_eq!(calls.load(Ordering::SeqCst), calls_at_stop);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_recurring_workflows_are_independent() {
    let bus = Arc::new(EventBus::new());
    let engine = ExecutionEngine::new(bus.clone());

    let first = compile("buy 1 btc every 5 seconds");
    let second = compile("sell 2 eth every 7 seconds");
    let mut rx_first = bus.subscribe(&first.id).await;
    let mut rx_second = bus.subscribe(&second.id).await;

    let first_orders = Arc::new(Mutex::new(Vec::new()));
    let second_orders = Arc::new(Mutex::new(Vec::new()));

    engine
        .execute(
            &first,
            ExecutionOptions::new(ProviderKind::Paper)
                .with_adapter(Arc::new(RecordingAdapter { orders: first_orders.clone() }))
                .with_max_iterations(2),
        )
        .await;
    engine
        .execute(
            &second,
            ExecutionOptions::new(ProviderKind::Paper)
                .with_adapter(Arc::new(RecordingAdapter { orders: second_orders.clone() }))
                .with_max_iterations(2),
        )
        .await;

    assert_eq!(engine.active_count().await, 2);

    // Both timers run to their caps independently.
    loop {
        let event = recv(&mut rx_first).await;
        if event.kind == EventKind::End {
            break;
        }
    }
    loop {
        let event = recv(&mut rx_second).await;
        if event.kind == EventKind::End {
            break;
        }
    }

    assert_eq!(first_orders.lock().expect("orders lock").len(), 2);
    assert_eq!(second_orders.lock().expect("orders lock").len(), 2);
    assert_eq!(engine.active_count().await, 0);

    let order = &first_orders.lock().expect("orders lock")[0];
    assert_eq!(order.side, OrderSide::Buy);
    assert_eq!(order.asset, "BTC");
}

#[tokio::test]
async fn test_quote_amount_resolves_against_price_feed() {
    let bus = Arc::new(EventBus::new());
    let feed = StaticPriceFeed::new().with_price("ETH-USDC", 2000.0);
    let engine = ExecutionEngine::new(bus).with_price_feed(Arc::new(feed));

    let mut workflow = single_trade_workflow("wf-quote-1");
    if let Action::Trade(trade) = &mut workflow.actions[0] {
        trade.side = OrderSide::Buy;
        trade.asset = "ETH".to_string();
        trade.quote_amount = Some(100.0);
        trade.quote_asset = Some("USDC".to_string());
    }

    let orders = Arc::new(Mutex::new(Vec::new()));
    let options = ExecutionOptions::new(ProviderKind::Paper)
        .with_adapter(Arc::new(RecordingAdapter { orders: orders.clone() }));
    let results = engine.execute(&workflow, options).await;

    assert!(results[0].ok);
    let recorded = orders.lock().expect("orders lock");
    assert_eq!(recorded.len(), 1);
    assert!((recorded[0].amount - 0.05).abs() < 1e-12);
}

#[tokio::test]
async fn test_quote_amount_falls_back_when_lookup_fails() {
    let bus = Arc::new(EventBus::new());
    let engine = ExecutionEngine::new(bus);

    let mut workflow = single_trade_workflow("wf-quote-2");
    if let Action::Trade(trade) = &mut workflow.actions[0] {
        trade.asset = "ETH".to_string();
        trade.quote_amount = Some(100.0);
        trade.quote_asset = Some("USDC".to_string());
    }

    let orders = Arc::new(Mutex::new(Vec::new()));
    let options = ExecutionOptions::new(ProviderKind::Paper)
        .with_adapter(Arc::new(RecordingAdapter { orders: orders.clone() }));
    engine.execute(&workflow, options).await;

    let recorded = orders.lock().expect("orders lock");
    let expected = 100.0 / FALLBACK_QUOTE_PRICE;
    assert!((recorded[0].amount - expected).abs() < 1e-12);
}

#[tokio::test]
async fn test_missing_credentials_fail_only_that_action() {
    std::env::remove_var("BINANCE_API_KEY");
    std::env::remove_var("BINANCE_API_SECRET");

    let bus = Arc::new(EventBus::new());
    let engine = ExecutionEngine::new(bus);

    let mut workflow = single_trade_workflow("wf-creds-1");
    workflow.actions.push(Action::Notification(NotificationAction {
        id: "a2".to_string(),
        channel: NotifyChannel::Email,
        to: "trader@example.com".to_string(),
        message: Some("Trade executed".to_string()),
    }));
    workflow.edges.push(Edge::new("a1", "a2"));

    let results = engine
        .execute(&workflow, ExecutionOptions::new(ProviderKind::Binance))
        .await;

    assert_eq!(results.len(), 2);
    assert!(!results[0].ok);
    assert!(results[0]
        .message
        .as_deref()
        .unwrap_or("")
        .contains("missing credentials"));
    // The sibling notification still went out.
    assert!(results[1].ok);
}

#[tokio::test]
async fn test_on_event_callback_sees_every_event() {
    let bus = Arc::new(EventBus::new());
    let engine = ExecutionEngine::new(bus);
    let workflow = single_trade_workflow("wf-callback-1");

    let seen: Arc<Mutex<Vec<WorkflowEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let options = ExecutionOptions::new(ProviderKind::Paper).with_on_event(Arc::new(move |event| {
        sink.lock().expect("events lock").push(event.clone());
    }));

    engine.execute(&workflow, options).await;

    let events = seen.lock().expect("events lock");
    assert_eq!(events.first().map(|e| e.kind), Some(EventKind::Start));
    assert_eq!(events.last().map(|e| e.kind), Some(EventKind::End));
    assert!(events.iter().all(|e| e.workflow_id == workflow.id));
}

#[tokio::test]
async fn test_zero_interval_timer_runs_one_shot() {
    // A timer trigger only selects recurring mode for a positive interval.
    let bus = Arc::new(EventBus::new());
    let engine = ExecutionEngine::new(bus.clone());

    let mut workflow = single_trade_workflow("wf-zero-timer");
    workflow.triggers = vec![Trigger::Timer(TimerTrigger {
        id: "t1".to_string(),
        interval_secs: 0,
    })];
    let mut rx = bus.subscribe(&workflow.id).await;

    let results = engine
        .execute(&workflow, ExecutionOptions::new(ProviderKind::Paper))
        .await;

    assert_eq!(results.len(), 1);
    assert!(results[0].ok);
    assert!(!engine.is_running(&workflow.id).await);
    let events = drain(&mut rx);
    assert_eq!(events[0].mode, Some(ExecutionMode::Oneshot));
}
