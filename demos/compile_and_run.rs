//! Compile a prompt and run it once against the paper provider.
//!
//! Usage: cargo run --example compile_and_run -- "sell BTC at 50000"

use std::sync::Arc;

use flowtrade_rs::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let prompt = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let prompt = if prompt.is_empty() {
        "sell BTC at 50000 and email me at trader@example.com".to_string()
    } else {
        prompt
    };

    let workflow = compile(&prompt);
    println!("{}", serde_json::to_string_pretty(&workflow)?);

    let bus = Arc::new(EventBus::new());
    let engine = ExecutionEngine::new(bus.clone());
    let mut rx = bus.subscribe(&workflow.id).await;

    let results = engine
        .execute(&workflow, ExecutionOptions::new(ProviderKind::Paper))
        .await;

    while let Ok(event) = rx.try_recv() {
        println!("event: {}", serde_json::to_string(&event)?);
    }
    println!("results: {}", serde_json::to_string_pretty(&results)?);

    Ok(())
}
