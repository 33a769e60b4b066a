//! Run a recurring paper-trading workflow to its iteration cap.
//!
//! Usage: cargo run --example recurring_paper_bot

use std::sync::Arc;

use tokio::time::{sleep, Duration};

use flowtrade_rs::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let workflow = compile("buy 10 ADA every 5 seconds and email me");
    let bus = Arc::new(EventBus::new());
    let engine = ExecutionEngine::new(bus.clone());

    // Forward the live status stream to stdout.
    let mut rx = bus.subscribe(&workflow.id).await;
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("event: {}", line),
                Err(err) => eprintln!("event serialization failed: {}", err),
            }
        }
    });

    let ack = engine
        .execute(
            &workflow,
            ExecutionOptions::new(ProviderKind::Paper).with_max_iterations(3),
        )
        .await;
    println!("ack: {:?}", ack.first().and_then(|r| r.message.as_deref()));

    while engine.is_running(&workflow.id).await {
        sleep(Duration::from_secs(1)).await;
    }

    Ok(())
}
