//! Phase 3 - endpoint confidence scoring
//!
//! Folds all pair verdicts sharing a source into one endpoint summary,
//! blends in the reputation signals of the destinations the source
//! talked to, and emits the final malicious/normal verdict with a
//! numeric confidence.

use crate::aggregate::{PairKey, PairVerdict};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use verdict_common::{EnsembleConfig, GroupThresholds, Label, SignalWeights};
use verdict_intel::ReputationSignals;

/// Final verdict for one source endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointVerdict {
    pub src: IpAddr,
    /// Preliminary label inherited from the first pair seen
    pub preliminary: Label,
    /// All flows from this source in the window
    pub total_flows: u64,
    /// Sum of the four bucket malicious counters across all pairs
    pub malicious_flows: u64,
    /// Reputation-signal sums over all destinations of this source
    pub url_sum: f64,
    pub download_sum: f64,
    pub referrer_sum: f64,
    pub communicating_sum: f64,
    /// Destination pairs evaluated
    pub total_pairs: u64,
    /// Destination pairs pre-labeled malicious by Phase 2
    pub malicious_pairs: u64,
    /// Weighted reputation contribution
    pub reputation_confidence: f64,
    /// Contribution from the malicious-pair count
    pub group_confidence: f64,
    /// group_confidence + reputation_confidence
    pub combined_confidence: f64,
    /// Final endpoint label
    pub label: Label,
}

impl EndpointVerdict {
    fn new(src: IpAddr, preliminary: Label) -> Self {
        Self {
            src,
            preliminary,
            total_flows: 0,
            malicious_flows: 0,
            url_sum: 0.0,
            download_sum: 0.0,
            referrer_sum: 0.0,
            communicating_sum: 0.0,
            total_pairs: 0,
            malicious_pairs: 0,
            reputation_confidence: 0.0,
            group_confidence: 0.0,
            combined_confidence: 0.0,
            label: Label::Normal,
        }
    }
}

/// Build per-source summaries from pair verdicts and reputation signals
///
/// `reputation` holds one entry per distinct destination, already
/// joined by the caller; a missing entry contributes zero signals
/// (the fail-open policy).
pub fn summarize(
    verdicts: &HashMap<PairKey, PairVerdict>,
    reputation: &HashMap<IpAddr, ReputationSignals>,
) -> HashMap<IpAddr, EndpointVerdict> {
    let mut summaries: HashMap<IpAddr, EndpointVerdict> = HashMap::new();

    for verdict in verdicts.values() {
        let signals = reputation
            .get(&verdict.dst)
            .copied()
            .unwrap_or(ReputationSignals::ZERO);

        let summary = summaries
            .entry(verdict.src)
            .or_insert_with(|| EndpointVerdict::new(verdict.src, verdict.predict_label));

        summary.total_flows += verdict.total_flows;
        summary.malicious_flows += verdict.malicious_flows();
        summary.url_sum += signals.url_ratio;
        summary.download_sum += signals.download_ratio;
        summary.referrer_sum += signals.referrer_ratio;
        summary.communicating_sum += signals.communicating_ratio;
        summary.total_pairs += 1;
        if verdict.predict_label.is_malicious() {
            summary.malicious_pairs += 1;
        }
    }

    summaries
}

/// Score the summaries and return the sources labeled malicious
///
/// The weight-to-signal pairing is fixed: w1*url + w2*download +
/// w3*communicating + w4*referrer. Both sides of the final comparison
/// are rounded to two decimals first, a deliberate tie-smoothing rule.
pub fn score(
    summaries: &mut HashMap<IpAddr, EndpointVerdict>,
    config: &EnsembleConfig,
) -> Vec<IpAddr> {
    let mut malicious_sources = Vec::new();

    for (src, summary) in summaries.iter_mut() {
        summary.reputation_confidence =
            reputation_confidence(&config.signal_weights, summary);
        summary.group_confidence =
            group_confidence(&config.group_thresholds, summary.malicious_pairs);
        summary.combined_confidence = summary.group_confidence + summary.reputation_confidence;

        if round2(summary.combined_confidence) >= round2(config.decision_threshold) {
            summary.label = Label::Malicious;
            malicious_sources.push(*src);
        } else {
            summary.label = Label::Normal;
        }

        tracing::debug!(
            src = %src,
            group = summary.group_confidence,
            reputation = summary.reputation_confidence,
            combined = summary.combined_confidence,
            label = %summary.label,
            "endpoint scored"
        );
    }

    malicious_sources
}

fn reputation_confidence(weights: &SignalWeights, summary: &EndpointVerdict) -> f64 {
    weights.w1_url * summary.url_sum
        + weights.w2_download * summary.download_sum
        + weights.w3_communicating * summary.communicating_sum
        + weights.w4_referrer * summary.referrer_sum
}

fn group_confidence(thresholds: &GroupThresholds, malicious_pairs: u64) -> f64 {
    if malicious_pairs >= thresholds.t3 {
        0.59
    } else if malicious_pairs >= thresholds.t2 {
        0.55
    } else if malicious_pairs >= thresholds.t1 {
        0.5
    } else {
        0.0
    }
}

/// Round to two decimals, half away from zero
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
