//! Pipeline configuration
//!
//! All scoring knobs live here so that hosts can load them from their
//! own configuration layer. `Default` carries the reference values the
//! pipeline was trained with; `validate` rejects configurations the
//! error taxonomy classifies as fatal.

use crate::{VerdictError, VerdictResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Per-classifier vote weights for Phase 1
pub type ClassifierWeights = HashMap<String, u32>;

/// Phase 2 pair-labeling thresholds
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PairThresholds {
    /// A bucket needs strictly more malicious flows than this to be labeled
    pub min_malicious_flows: u64,
    /// A bucket needs a strictly greater malicious percentage than this
    pub min_malicious_percent: f64,
}

impl Default for PairThresholds {
    fn default() -> Self {
        Self {
            min_malicious_flows: 0,
            min_malicious_percent: 25.0,
        }
    }
}

/// Phase 3 reputation-signal weights
///
/// The signal pairing is fixed: w1 multiplies the url sum, w2 the
/// download sum, w3 the communicating sum and w4 the referrer sum.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SignalWeights {
    pub w1_url: f64,
    pub w2_download: f64,
    pub w3_communicating: f64,
    pub w4_referrer: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            w1_url: 0.19,
            w2_download: 0.8,
            w3_communicating: 0.01,
            w4_referrer: 0.0,
        }
    }
}

/// Phase 3 malicious-group count thresholds, strictly increasing
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GroupThresholds {
    pub t1: u64,
    pub t2: u64,
    pub t3: u64,
}

impl Default for GroupThresholds {
    fn default() -> Self {
        Self { t1: 1, t2: 5, t3: 20 }
    }
}

/// Full pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleConfig {
    /// Phase 1 vote weight per classifier name
    pub classifier_weights: ClassifierWeights,
    /// Phase 2 thresholds
    pub pair_thresholds: PairThresholds,
    /// Phase 3 signal weights
    pub signal_weights: SignalWeights,
    /// Phase 3 group thresholds
    pub group_thresholds: GroupThresholds,
    /// Minimum combined confidence for a malicious endpoint verdict
    pub decision_threshold: f64,
    /// Upper bound on one reputation lookup before failing open
    pub reputation_timeout: Duration,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        let mut classifier_weights = HashMap::new();
        classifier_weights.insert("anomaly".to_string(), 1);
        classifier_weights.insert("flow_ml".to_string(), 3);
        classifier_weights.insert("signature".to_string(), 1);

        Self {
            classifier_weights,
            pair_thresholds: PairThresholds::default(),
            signal_weights: SignalWeights::default(),
            group_thresholds: GroupThresholds::default(),
            decision_threshold: 0.55,
            reputation_timeout: Duration::from_secs(5),
        }
    }
}

impl EnsembleConfig {
    /// Validate the configuration; called once at startup
    pub fn validate(&self) -> VerdictResult<()> {
        if self.classifier_weights.is_empty() {
            return Err(VerdictError::Config(
                "classifier weight table is empty".to_string(),
            ));
        }
        let GroupThresholds { t1, t2, t3 } = self.group_thresholds;
        if t1 >= t2 || t2 >= t3 {
            return Err(VerdictError::Config(format!(
                "group thresholds must be strictly increasing, got {} {} {}",
                t1, t2, t3
            )));
        }
        if !(0.0..=100.0).contains(&self.pair_thresholds.min_malicious_percent) {
            return Err(VerdictError::Config(format!(
                "min_malicious_percent out of range: {}",
                self.pair_thresholds.min_malicious_percent
            )));
        }
        Ok(())
    }
}
