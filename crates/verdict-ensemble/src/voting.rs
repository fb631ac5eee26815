//! Phase 1 - weighted label fusion
//!
//! Combines the independent per-flow classifier opinions into one
//! fused label by weighted majority vote.

use std::collections::HashMap;
use verdict_common::{ClassifierWeights, Label, VerdictError, VerdictResult};

/// Fuse one flow's classifier labels into a single label
///
/// Malicious wins only on a strictly greater weight sum; ties resolve
/// to normal. A classifier without a configured weight is a
/// configuration error, not a runtime fallback.
pub fn fuse(weights: &ClassifierWeights, labels: &HashMap<String, Label>) -> VerdictResult<Label> {
    let mut malicious_votes: u64 = 0;
    let mut normal_votes: u64 = 0;

    for (classifier, label) in labels {
        let weight = *weights.get(classifier).ok_or_else(|| {
            VerdictError::Config(format!(
                "no vote weight configured for classifier '{}'",
                classifier
            ))
        })? as u64;

        match label {
            Label::Malicious => malicious_votes += weight,
            Label::Normal => normal_votes += weight,
        }
    }

    Ok(if malicious_votes > normal_votes {
        Label::Malicious
    } else {
        Label::Normal
    })
}
