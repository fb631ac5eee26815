//! FlowVerdict worker - offline window scorer
//!
//! Reads one window's flows from a JSON dump, runs all three phases
//! and prints the endpoint verdicts. Useful for replaying captured
//! windows against a candidate configuration.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use verdict_common::{EnsembleConfig, FlowKey, FlowRecord, ProfileId, WindowId, WindowRef};
use verdict_intel::StaticReputation;
use verdict_worker::{EnsembleWorker, MemoryFlowStore, MemoryWindowEvents};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("FlowVerdict worker v{}", env!("CARGO_PKG_VERSION"));

    let config = match std::env::var("CONFIG_PATH") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config {}", path))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path))?
        }
        Err(_) => {
            tracing::warn!("CONFIG_PATH not set, using default configuration");
            EnsembleConfig::default()
        }
    };

    let flows_path = std::env::args()
        .nth(1)
        .context("usage: verdict-worker <flows.json>")?;
    let raw = std::fs::read_to_string(&flows_path)
        .with_context(|| format!("reading flows {}", flows_path))?;
    let flows: HashMap<FlowKey, FlowRecord> =
        serde_json::from_str(&raw).with_context(|| format!("parsing flows {}", flows_path))?;
    tracing::info!(flows = flows.len(), "window loaded");

    let store = Arc::new(MemoryFlowStore::new());
    let profile = ProfileId::new("offline");
    let window = WindowId::new("tw1");
    store.insert_window(&profile, &window, flows);

    let (_sender, events) = MemoryWindowEvents::channel(1);
    let worker = EnsembleWorker::new(
        config,
        events,
        store.clone(),
        Arc::new(StaticReputation::new()),
    )?;

    let verdict = worker
        .evaluate_window(&WindowRef::new("offline", "tw1"))
        .await?;

    for src in &verdict.malicious_sources {
        tracing::warn!(src = %src, "malicious endpoint");
    }
    println!("{}", serde_json::to_string_pretty(&verdict.endpoints)?);
    Ok(())
}
