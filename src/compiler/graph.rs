//! Graph synthesis
//!
//! Turns the extractors' raw output into a consistent `Workflow`: node id
//! assignment, loop-control injection for recurring prompts, the
//! always-appended notification, deterministic edge wiring, and the fallback
//! trigger/action injection that guarantees every compiled graph has at
//! least a trigger, a trade, and a notification node.

use crate::workflow::{
    Action, CompareOp, Edge, LoopControlAction, NotificationAction, NotifyChannel, OrderSide,
    PriceTrigger, TimerTrigger, TradeAction, Trigger, Workflow,
};

use super::extract::{NotifyTarget, QuoteSizing, RawPriceTrigger, RawTradeAction, Recurrence, RiskTargets};

/// Iteration ceiling carried by synthesized loop-control nodes.
pub const LOOP_MAX_ITERATIONS: u32 = 10;

/// Placeholder recipient when the prompt names no notification target.
const DEFAULT_NOTIFY_TO: &str = "trader@example.com";

/// Everything the extractors produced for one prompt.
#[derive(Debug)]
pub(crate) struct SynthesisInput {
    pub asset: String,
    pub trades: Vec<RawTradeAction>,
    pub quote: Option<QuoteSizing>,
    pub price_triggers: Vec<RawPriceTrigger>,
    pub recurrence: Option<Recurrence>,
    pub risk: RiskTargets,
    pub notify: Option<NotifyTarget>,
}

pub(crate) fn synthesize(id: String, name: String, input: SynthesisInput) -> Workflow {
    let SynthesisInput { asset, trades, quote, price_triggers, recurrence, risk, notify } = input;

    // Triggers: price conditions in text order, the timer last.
    let mut triggers: Vec<Trigger> = Vec::new();
    for raw in &price_triggers {
        triggers.push(Trigger::Price(PriceTrigger {
            id: format!("t{}", triggers.len() + 1),
            asset: asset.clone(),
            operator: raw.operator,
            threshold: raw.threshold,
        }));
    }
    if let Some(rec) = recurrence {
        triggers.push(Trigger::Timer(TimerTrigger {
            id: format!("t{}", triggers.len() + 1),
            interval_secs: rec.interval_secs,
        }));
    }

    let mut trade_nodes: Vec<TradeAction> = trades
        .iter()
        .map(|raw| {
            let mut node = TradeAction::new("", raw.side, asset.clone(), raw.amount.max(0.0));
            node.leverage = raw.leverage;
            node
        })
        .collect();

    // Fallback: no recognizable action language → a default buy of 1.
    if trade_nodes.is_empty() {
        trade_nodes.push(TradeAction::new("", OrderSide::Buy, asset.clone(), 1.0));
    }

    // Fallback: no recognizable trigger language → placeholder price trigger.
    if triggers.is_empty() {
        triggers.push(Trigger::Price(PriceTrigger {
            id: "t1".to_string(),
            asset: asset.clone(),
            operator: CompareOp::Gte,
            threshold: 0.0,
        }));
    }

    // The first trade carries quote sizing and risk targets.
    if let Some(first) = trade_nodes.first_mut() {
        if let Some(q) = quote {
            first.quote_amount = Some(q.quote_amount);
            first.quote_asset = Some(q.quote_asset);
            first.asset = q.target_asset;
        }
        first.take_profit = risk.take_profit;
        first.take_profit_percent = risk.take_profit_percent;
        first.stop_loss = risk.stop_loss;
        first.stop_loss_percent = risk.stop_loss_percent;
    }

    let summary = trade_nodes
        .first()
        .map(summary_message)
        .unwrap_or_else(|| "Trade executed".to_string());

    // Actions: trades in text order, then loop control, then notification.
    let mut actions: Vec<Action> = Vec::new();
    for mut node in trade_nodes {
        node.id = format!("a{}", actions.len() + 1);
        actions.push(Action::Trade(node));
    }
    let trade_count = actions.len();
    let first_trade_id = "a1".to_string();
    let last_trade_id = format!("a{}", trade_count);

    let loop_id = recurrence.map(|rec| {
        let id = format!("a{}", actions.len() + 1);
        actions.push(Action::LoopControl(LoopControlAction {
            id: id.clone(),
            max_iterations: LOOP_MAX_ITERATIONS,
            current_iteration: 0,
            interval_secs: rec.interval_secs,
            message: Some(format!("Re-run the trade chain every {} seconds", rec.interval_secs)),
        }));
        id
    });

    let notify_id = format!("a{}", actions.len() + 1);
    let (channel, to) = notify
        .map(|n| (n.channel, n.to))
        .unwrap_or_else(|| (NotifyChannel::Email, DEFAULT_NOTIFY_TO.to_string()));
    actions.push(Action::Notification(NotificationAction {
        id: notify_id.clone(),
        channel,
        to,
        message: Some(summary),
    }));

    // Edges.
    let mut edges: Vec<Edge> = Vec::new();
    match &loop_id {
        // Recurring cycle: timer → loop → trades → notify → loop.
        Some(loop_id) => {
            for trigger in &triggers {
                match trigger {
                    Trigger::Timer(t) => edges.push(Edge::new(&t.id, loop_id)),
                    Trigger::Price(t) => edges.push(Edge::new(&t.id, &first_trade_id)),
                }
            }
            edges.push(Edge::new(loop_id, &first_trade_id));
            chain_trades(&mut edges, trade_count);
            edges.push(Edge::new(&last_trade_id, &notify_id));
            edges.push(Edge::new(&notify_id, loop_id));
        }
        // One-shot chain: every trigger fans in to the first trade.
        None => {
            for trigger in &triggers {
                edges.push(Edge::new(trigger.id(), &first_trade_id));
            }
            chain_trades(&mut edges, trade_count);
            edges.push(Edge::new(&last_trade_id, &notify_id));
        }
    }

    Workflow { id, name, triggers, actions, edges }
}

fn chain_trades(edges: &mut Vec<Edge>, trade_count: usize) {
    for i in 1..trade_count {
        edges.push(Edge::new(format!("a{}", i), format!("a{}", i + 1)));
    }
}

fn summary_message(trade: &TradeAction) -> String {
    format!("{} {} {} executed", trade.side.as_str().to_uppercase(), trade.amount, trade.asset)
}
