//! Workflow domain model
//!
//! A `Workflow` is the directed graph of triggers, actions, and edges the
//! compiler produces from free text and the execution engine interprets.
//! Triggers and actions are proper sum types wrapping variant structs; the
//! serde representation carries a `"type"` tag so the graph stays readable
//! on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operator for price conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Gte => ">=",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
        };
        write!(f, "{}", s)
    }
}

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
    Long,
    Short,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
            OrderSide::Long => "long",
            OrderSide::Short => "short",
        }
    }

    /// Parse a side keyword as it appears in the prompt.
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "buy" => Some(OrderSide::Buy),
            "sell" => Some(OrderSide::Sell),
            "long" => Some(OrderSide::Long),
            "short" => Some(OrderSide::Short),
            _ => None,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Notification delivery channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyChannel {
    Email,
    Sms,
    Discord,
}

impl fmt::Display for NotifyChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotifyChannel::Email => "email",
            NotifyChannel::Sms => "sms",
            NotifyChannel::Discord => "discord",
        };
        write!(f, "{}", s)
    }
}

/// Fires when the market price of `asset` satisfies `operator threshold`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTrigger {
    pub id: String,
    pub asset: String,
    pub operator: CompareOp,
    pub threshold: f64,
}

/// Fires on a fixed cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerTrigger {
    pub id: String,
    pub interval_secs: u64,
}

/// How a workflow's action chain is started
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Trigger {
    #[serde(rename = "PriceTrigger")]
    Price(PriceTrigger),
    #[serde(rename = "TimerTrigger")]
    Timer(TimerTrigger),
}

impl Trigger {
    pub fn id(&self) -> &str {
        match self {
            Trigger::Price(t) => &t.id,
            Trigger::Timer(t) => &t.id,
        }
    }
}

/// Trade placement node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeAction {
    pub id: String,
    pub side: OrderSide,
    pub asset: String,
    /// Always present and non-negative. When `quote_amount` is set this is a
    /// provisional placeholder resolved against a live price at execution.
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leverage: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_asset: Option<String>,
}

impl TradeAction {
    /// Minimal trade node; optional fields attach afterwards.
    pub fn new(id: impl Into<String>, side: OrderSide, asset: impl Into<String>, amount: f64) -> Self {
        Self {
            id: id.into(),
            side,
            asset: asset.into(),
            amount,
            leverage: None,
            take_profit: None,
            take_profit_percent: None,
            stop_loss: None,
            stop_loss_percent: None,
            quote_amount: None,
            quote_asset: None,
        }
    }
}

/// Notification node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationAction {
    pub id: String,
    pub channel: NotifyChannel,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Cycle boundary marker for recurring workflows; carries no side effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopControlAction {
    pub id: String,
    pub max_iterations: u32,
    pub current_iteration: u32,
    pub interval_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Effect node in the workflow graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    #[serde(rename = "TradeAction")]
    Trade(TradeAction),
    #[serde(rename = "NotificationAction")]
    Notification(NotificationAction),
    #[serde(rename = "LoopControlAction")]
    LoopControl(LoopControlAction),
}

impl Action {
    pub fn id(&self) -> &str {
        match self {
            Action::Trade(a) => &a.id,
            Action::Notification(a) => &a.id,
            Action::LoopControl(a) => &a.id,
        }
    }
}

/// Directed edge between two nodes, referenced by id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self { from: from.into(), to: to.into() }
    }
}

/// A complete workflow definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub triggers: Vec<Trigger>,
    pub actions: Vec<Action>,
    pub edges: Vec<Edge>,
}

impl Workflow {
    /// First timer trigger, if any. Drives the engine's mode selection.
    pub fn timer(&self) -> Option<&TimerTrigger> {
        self.triggers.iter().find_map(|t| match t {
            Trigger::Timer(timer) => Some(timer),
            _ => None,
        })
    }

    /// A workflow handed to the engine must carry at least one trigger and
    /// one action.
    pub fn has_structure(&self) -> bool {
        !self.triggers.is_empty() && !self.actions.is_empty()
    }

    /// First edge whose endpoints do not reference a node in this workflow.
    pub fn dangling_edge(&self) -> Option<&Edge> {
        self.edges.iter().find(|e| {
            let known = |id: &str| {
                self.triggers.iter().any(|t| t.id() == id)
                    || self.actions.iter().any(|a| a.id() == id)
            };
            !known(&e.from) || !known(&e.to)
        })
    }
}
