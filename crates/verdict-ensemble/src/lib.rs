//! FlowVerdict Ensemble - multi-phase endpoint scoring
//!
//! Turns one closed monitoring window's flows into a final verdict per
//! source endpoint:
//!
//! ```text
//! flows ──► Phase 1: weighted label fusion (voting)
//!       ──► Phase 2: pair aggregation over (src, dst, proto, state)
//!       ──► Phase 3: reputation-blended endpoint confidence
//! ```
//!
//! The pipeline is stateless between windows; every accumulator is
//! local to one [`EnsemblePipeline::evaluate`] call. Collaborator I/O
//! (flow storage, reputation lookups, malicious reports) stays outside
//! this crate: callers fuse labels through [`EnsemblePipeline::fuse_flow`],
//! join reputation signals per destination, and pass both in.

#![warn(clippy::all)]

pub mod aggregate;
pub mod confidence;
pub mod state;
pub mod voting;

pub use aggregate::{Aggregation, Bucket, BucketScore, LabelCount, PairCounters, PairKey, PairVerdict};
pub use confidence::EndpointVerdict;
pub use state::classify;
pub use voting::fuse;

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use verdict_common::{EnsembleConfig, FlowKey, FlowRecord, Label, VerdictResult};
use verdict_intel::ReputationSignals;

/// Outcome of scoring one window
#[derive(Debug, Default)]
pub struct WindowVerdict {
    /// Preliminary verdict per source-destination pair
    pub pairs: HashMap<PairKey, PairVerdict>,
    /// Final verdict per source endpoint
    pub endpoints: HashMap<IpAddr, EndpointVerdict>,
    /// Sources labeled malicious, to be reported by the caller
    pub malicious_sources: Vec<IpAddr>,
    /// Flows dropped for missing data
    pub skipped_flows: u64,
}

/// The scoring pipeline for one endpoint's closed windows
#[derive(Debug, Clone)]
pub struct EnsemblePipeline {
    config: EnsembleConfig,
}

impl EnsemblePipeline {
    /// Create a pipeline; rejects invalid configuration up front
    pub fn new(config: EnsembleConfig) -> VerdictResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    /// Phase 1 for one flow: fuse its classifier labels
    pub fn fuse_flow(&self, labels: &HashMap<String, Label>) -> VerdictResult<Label> {
        voting::fuse(&self.config.classifier_weights, labels)
    }

    /// The distinct destinations of a fused flow set
    ///
    /// Callers resolve reputation signals for these before `evaluate`.
    pub fn destinations(flows: &HashMap<FlowKey, FlowRecord>) -> HashSet<IpAddr> {
        flows.values().map(|f| f.daddr).collect()
    }

    /// Phases 2 and 3 over an already-fused flow set
    pub fn evaluate(
        &self,
        flows: &HashMap<FlowKey, FlowRecord>,
        reputation: &HashMap<IpAddr, ReputationSignals>,
    ) -> WindowVerdict {
        let mut agg = aggregate::aggregate(flows);
        aggregate::score_and_label(&mut agg, &self.config.pair_thresholds);

        let mut endpoints = confidence::summarize(&agg.verdicts, reputation);
        let malicious_sources = confidence::score(&mut endpoints, &self.config);

        tracing::info!(
            pairs = agg.verdicts.len(),
            endpoints = endpoints.len(),
            malicious = malicious_sources.len(),
            skipped = agg.skipped_flows,
            "window evaluated"
        );

        WindowVerdict {
            pairs: agg.verdicts,
            endpoints,
            malicious_sources,
            skipped_flows: agg.skipped_flows,
        }
    }
}
