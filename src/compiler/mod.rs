//! Workflow compiler: free text to executable graph
//!
//! `compile` runs the lexical extractors over the lowercased prompt, then
//! hands their output to the graph synthesizer. It never fails: worst case
//! the fallbacks produce a minimal trigger/trade/notification graph.

pub mod extract;
pub mod graph;

use tracing::{debug, info};
use uuid::Uuid;

use crate::workflow::Workflow;

use self::extract::{
    extract_asset, extract_notify_target, extract_price_triggers, extract_quote_sizing,
    extract_recurrence, extract_risk_targets, extract_trade_actions,
};
use self::graph::{synthesize, SynthesisInput};

/// Compile a free-text strategy description into a `Workflow`.
pub fn compile(text: &str) -> Workflow {
    let lower = text.to_lowercase();

    let asset = extract_asset(&lower);
    let trades = extract_trade_actions(&lower);
    let quote = extract_quote_sizing(&lower);
    let price_triggers = extract_price_triggers(&lower);
    let recurrence = extract_recurrence(&lower);
    let risk = extract_risk_targets(&lower);
    let notify = extract_notify_target(&lower);

    debug!(
        asset = %asset,
        trades = trades.len(),
        price_triggers = price_triggers.len(),
        recurring = recurrence.is_some(),
        "extraction complete"
    );

    let id = format!("wf-{}", Uuid::new_v4());
    let name: String = text.chars().take(50).collect();

    let workflow = synthesize(
        id,
        name,
        SynthesisInput { asset, trades, quote, price_triggers, recurrence, risk, notify },
    );

    info!(
        "compiled workflow {}: {} triggers, {} actions, {} edges",
        workflow.id,
        workflow.triggers.len(),
        workflow.actions.len(),
        workflow.edges.len()
    );

    workflow
}

/// Unit-struct handle for callers that prefer a named compiler over the free
/// function.
pub struct WorkflowCompiler;

impl WorkflowCompiler {
    pub fn compile(text: &str) -> Workflow {
        compile(text)
    }
}
