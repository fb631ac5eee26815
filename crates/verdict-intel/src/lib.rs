//! FlowVerdict reputation intelligence
//!
//! Per-destination reputation signals consumed by the Phase 3 scorer.
//! The provider contract is deliberately narrow: four bounded ratios
//! per address, and a lookup that fails open to zero signals so that
//! reputation unavailability can never block an endpoint verdict.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use verdict_common::VerdictResult;

pub mod cache;
pub mod sources;

pub use cache::{CachedReputation, TimeoutReputation};
pub use sources::VirusTotalSource;

/// Reputation signals for one destination address
///
/// Each ratio is the fraction of known-bad associations of that kind
/// (detected URLs, downloaded samples, referrer samples, communicating
/// samples) reported by the intelligence source, in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReputationSignals {
    pub url_ratio: f64,
    pub download_ratio: f64,
    pub referrer_ratio: f64,
    pub communicating_ratio: f64,
}

impl ReputationSignals {
    /// The fail-open value: no known-bad association
    pub const ZERO: ReputationSignals = ReputationSignals {
        url_ratio: 0.0,
        download_ratio: 0.0,
        referrer_ratio: 0.0,
        communicating_ratio: 0.0,
    };

    pub fn new(url: f64, download: f64, referrer: f64, communicating: f64) -> Self {
        Self {
            url_ratio: url,
            download_ratio: download,
            referrer_ratio: referrer,
            communicating_ratio: communicating,
        }
    }
}

/// Reputation lookup contract
///
/// Implementations may fail; callers compose them with
/// [`TimeoutReputation`] to get the bounded, fail-open behavior the
/// pipeline requires.
#[async_trait]
pub trait ReputationProvider: Send + Sync {
    /// Look up the reputation signals for one destination address
    async fn lookup(&self, addr: IpAddr) -> VerdictResult<ReputationSignals>;
}

/// Fixed in-memory provider, for tests and development
///
/// Unknown addresses resolve to zero signals.
#[derive(Debug, Default)]
pub struct StaticReputation {
    entries: HashMap<IpAddr, ReputationSignals>,
}

impl StaticReputation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed signals for one address
    pub fn with_entry(mut self, addr: IpAddr, signals: ReputationSignals) -> Self {
        self.entries.insert(addr, signals);
        self
    }
}

#[async_trait]
impl ReputationProvider for StaticReputation {
    async fn lookup(&self, addr: IpAddr) -> VerdictResult<ReputationSignals> {
        Ok(self.entries.get(&addr).copied().unwrap_or(ReputationSignals::ZERO))
    }
}
