//! Workflow event bus
//!
//! Process-wide publish/subscribe keyed by workflow id. Each key owns a
//! broadcast channel; every subscriber receives every published event in
//! publish order. Delivery is at-most-once and best-effort: events published
//! before a subscription exists are lost, which is fine for live status
//! observation.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

use crate::exchange::ExecutionResult;

/// Routing key used when an event carries no workflow id.
pub const GLOBAL_CHANNEL: &str = "global";

/// Broadcast buffer per channel; slow subscribers past this lag lose events.
const EVENT_BUFFER: usize = 1000;

/// Lifecycle event category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Start,
    Action,
    End,
}

/// Per-action progress state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Placing,
    Placed,
    Failed,
    Sending,
    Sent,
}

/// How the engine is running the workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Oneshot,
    Timer,
}

/// Why a recurring workflow ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndReason {
    MaxIterations,
    Stopped,
}

/// One lifecycle event on the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub workflow_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ActionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<ExecutionMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ExecutionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<EndReason>,
    /// Milliseconds since the epoch.
    pub ts: i64,
}

impl WorkflowEvent {
    fn base(kind: EventKind, workflow_id: impl Into<String>) -> Self {
        Self {
            kind,
            workflow_id: workflow_id.into(),
            action_id: None,
            status: None,
            iteration: None,
            mode: None,
            interval_secs: None,
            result: None,
            reason: None,
            ts: Utc::now().timestamp_millis(),
        }
    }

    pub fn start(workflow_id: impl Into<String>, mode: ExecutionMode, interval_secs: Option<u64>) -> Self {
        let mut event = Self::base(EventKind::Start, workflow_id);
        event.mode = Some(mode);
        event.interval_secs = interval_secs;
        event
    }

    pub fn action(
        workflow_id: impl Into<String>,
        action_id: impl Into<String>,
        status: ActionStatus,
        iteration: Option<u64>,
        result: Option<ExecutionResult>,
    ) -> Self {
        let mut event = Self::base(EventKind::Action, workflow_id);
        event.action_id = Some(action_id.into());
        event.status = Some(status);
        event.iteration = iteration;
        event.result = result;
        event
    }

    pub fn end(workflow_id: impl Into<String>, reason: Option<EndReason>) -> Self {
        let mut event = Self::base(EventKind::End, workflow_id);
        event.reason = reason;
        event
    }
}

/// Publish/subscribe registry, one broadcast channel per workflow id.
#[derive(Debug, Default)]
pub struct EventBus {
    channels: RwLock<HashMap<String, broadcast::Sender<WorkflowEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn route_key(workflow_id: &str) -> &str {
        if workflow_id.is_empty() {
            GLOBAL_CHANNEL
        } else {
            workflow_id
        }
    }

    /// Subscribe to a workflow's events. Dropping the receiver unsubscribes.
    pub async fn subscribe(&self, workflow_id: &str) -> broadcast::Receiver<WorkflowEvent> {
        let key = Self::route_key(workflow_id);
        let mut channels = self.channels.write().await;
        channels
            .entry(key.to_string())
            .or_insert_with(|| broadcast::channel(EVENT_BUFFER).0)
            .subscribe()
    }

    /// Publish an event to its workflow's channel. Events with no live
    /// subscriber are dropped and the stale channel pruned.
    pub async fn publish(&self, event: WorkflowEvent) {
        let key = Self::route_key(&event.workflow_id).to_string();
        let mut channels = self.channels.write().await;
        if let Some(sender) = channels.get(&key) {
            if sender.send(event).is_err() {
                channels.remove(&key);
            }
        }
    }

    /// Live receivers on a workflow's channel.
    pub async fn subscriber_count(&self, workflow_id: &str) -> usize {
        let channels = self.channels.read().await;
        channels
            .get(Self::route_key(workflow_id))
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}
