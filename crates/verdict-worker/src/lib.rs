//! FlowVerdict Worker - sequential window consumer
//!
//! One logical worker pulls "window closed" notifications and runs the
//! scoring pipeline end to end for each, one window at a time. A
//! window's failure is logged and counted at the window boundary; it
//! never terminates the loop. Reputation lookups are the only suspend
//! point inside an evaluation and are fanned out per distinct
//! destination, joined before Phase 3 scoring.

#![warn(clippy::all)]

pub mod memory;
pub mod store;

pub use memory::{MemoryFlowStore, MemoryWindowEvents};
pub use store::{FlowStore, WindowEvents};

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use verdict_common::{EnsembleConfig, VerdictResult, WindowRef};
use verdict_ensemble::{EnsemblePipeline, WindowVerdict};
use verdict_intel::{ReputationProvider, ReputationSignals, TimeoutReputation};

/// Reason tag attached to malicious endpoint reports
pub const REPORT_REASON: &str = "ensemble:confidence-score";

/// Worker counters
#[derive(Debug, Default)]
pub struct WorkerStats {
    pub windows_processed: AtomicU64,
    pub windows_failed: AtomicU64,
    pub flows_skipped: AtomicU64,
    pub reports_emitted: AtomicU64,
}

/// Snapshot of [`WorkerStats`]
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct WorkerStatsSnapshot {
    pub windows_processed: u64,
    pub windows_failed: u64,
    pub flows_skipped: u64,
    pub reports_emitted: u64,
}

impl WorkerStats {
    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            windows_processed: self.windows_processed.load(Ordering::Relaxed),
            windows_failed: self.windows_failed.load(Ordering::Relaxed),
            flows_skipped: self.flows_skipped.load(Ordering::Relaxed),
            reports_emitted: self.reports_emitted.load(Ordering::Relaxed),
        }
    }
}

/// The window consumer
pub struct EnsembleWorker<E: WindowEvents> {
    events: E,
    store: Arc<dyn FlowStore>,
    reputation: Arc<dyn ReputationProvider>,
    pipeline: EnsemblePipeline,
    stats: Arc<WorkerStats>,
}

impl<E: WindowEvents> EnsembleWorker<E> {
    /// Build a worker; configuration problems surface here, at startup
    pub fn new(
        config: EnsembleConfig,
        events: E,
        store: Arc<dyn FlowStore>,
        reputation: Arc<dyn ReputationProvider>,
    ) -> VerdictResult<Self> {
        let pipeline = EnsemblePipeline::new(config)?;
        // Every lookup goes through the bounded fail-open wrapper
        let reputation = Arc::new(TimeoutReputation::new(
            reputation,
            pipeline.config().reputation_timeout,
        ));
        Ok(Self {
            events,
            store,
            reputation,
            pipeline,
            stats: Arc::new(WorkerStats::default()),
        })
    }

    pub fn stats(&self) -> Arc<WorkerStats> {
        self.stats.clone()
    }

    /// Consume notifications until the event source closes
    pub async fn run(mut self) -> WorkerStatsSnapshot {
        while let Some(window) = self.events.next_closed().await {
            match self.evaluate_window(&window).await {
                Ok(verdict) => {
                    self.stats.windows_processed.fetch_add(1, Ordering::Relaxed);
                    self.stats
                        .flows_skipped
                        .fetch_add(verdict.skipped_flows, Ordering::Relaxed);
                }
                Err(e) => {
                    tracing::error!(window = %window, error = %e, "window evaluation failed");
                    self.stats.windows_failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        tracing::info!("window event source closed, worker draining out");
        self.stats.snapshot()
    }

    /// Run all phases for one closed window
    pub async fn evaluate_window(&self, window: &WindowRef) -> VerdictResult<WindowVerdict> {
        let mut flows = self.store.flows(&window.profile, &window.window).await?;
        if flows.is_empty() {
            tracing::debug!(window = %window, "no flows in window");
            return Ok(WindowVerdict::default());
        }
        tracing::debug!(window = %window, flows = flows.len(), "evaluating window");

        // Phase 1: fuse each flow's classifier labels and write them
        // back. Flows without labels stay unfused; the aggregation
        // pass skips and counts them.
        for (key, flow) in flows.iter_mut() {
            let labels = if flow.classifier_labels.is_empty() {
                self.store
                    .classifier_labels(&window.profile, &window.window, key)
                    .await?
            } else {
                flow.classifier_labels.clone()
            };
            if labels.is_empty() {
                tracing::warn!(window = %window, flow = %key, "flow has no classifier labels");
                continue;
            }

            let fused = self.pipeline.fuse_flow(&labels)?;
            self.store
                .write_fused_label(&window.profile, &window.window, key, fused)
                .await?;
            flow.fused_label = Some(fused);
        }

        // Reputation fan-out, one lookup per distinct destination
        let reputation = self.lookup_reputation(&flows).await;

        // Phases 2 and 3
        let verdict = self.pipeline.evaluate(&flows, &reputation);

        for src in &verdict.malicious_sources {
            self.store
                .report_malicious(&window.profile, REPORT_REASON)
                .await?;
            self.stats.reports_emitted.fetch_add(1, Ordering::Relaxed);
            tracing::info!(window = %window, src = %src, "endpoint reported malicious");
        }

        Ok(verdict)
    }

    async fn lookup_reputation(
        &self,
        flows: &HashMap<verdict_common::FlowKey, verdict_common::FlowRecord>,
    ) -> HashMap<IpAddr, ReputationSignals> {
        let mut lookups = JoinSet::new();
        for dst in EnsemblePipeline::destinations(flows) {
            let provider = self.reputation.clone();
            lookups.spawn(async move { (dst, provider.lookup(dst).await) });
        }

        let mut reputation = HashMap::new();
        while let Some(joined) = lookups.join_next().await {
            match joined {
                Ok((dst, Ok(signals))) => {
                    reputation.insert(dst, signals);
                }
                Ok((dst, Err(e))) => {
                    // Fail open: an unavailable reputation source never
                    // blocks the endpoint verdict.
                    tracing::warn!(dst = %dst, error = %e, "reputation lookup failed, using zero signals");
                    reputation.insert(dst, ReputationSignals::ZERO);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "reputation lookup task aborted");
                }
            }
        }
        reputation
    }
}
