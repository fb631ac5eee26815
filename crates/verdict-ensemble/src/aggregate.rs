//! Phase 2 - relationship aggregation
//!
//! Builds hierarchical malicious/total counters over
//! (source, destination, protocol, canonical state) and derives a
//! preliminary label per source-destination pair from per-bucket
//! malicious percentages. Counters live in flat maps keyed by
//! composite tuples; buckets exist only once a flow populates them, so
//! a zero denominator is structurally impossible.

use crate::state::classify;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use verdict_common::{CanonicalState, FlowKey, FlowRecord, Label, PairThresholds, Proto};

/// One source-destination relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairKey {
    pub src: IpAddr,
    pub dst: IpAddr,
}

impl PairKey {
    pub fn new(src: IpAddr, dst: IpAddr) -> Self {
        Self { src, dst }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.src, self.dst)
    }
}

/// Total/malicious/normal flow counts at one nesting level
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LabelCount {
    pub total: u64,
    pub malicious: u64,
    pub normal: u64,
}

impl LabelCount {
    fn record(&mut self, label: Label) {
        self.total += 1;
        match label {
            Label::Malicious => self.malicious += 1,
            Label::Normal => self.normal += 1,
        }
        debug_assert!(self.malicious <= self.total);
    }

    /// Fraction of malicious flows, 0.0 for an empty counter
    pub fn malicious_ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.malicious as f64 / self.total as f64
    }

    /// Percentage of malicious flows; the counter must not be empty
    fn percent_malicious(&self) -> f64 {
        debug_assert!(self.total > 0, "percentage of an empty bucket");
        100.0 * self.malicious as f64 / self.total as f64
    }
}

/// Hierarchical flow counters for one window evaluation
///
/// Four nesting levels, from source alone down to
/// (source, destination, protocol, state). The per-level malicious
/// ratios above the deepest level are diagnostic only; scoring uses
/// the per-state buckets.
#[derive(Debug, Default)]
pub struct PairCounters {
    per_src: HashMap<IpAddr, LabelCount>,
    per_pair: HashMap<PairKey, LabelCount>,
    per_proto: HashMap<(PairKey, Proto), LabelCount>,
    per_state: HashMap<(PairKey, Proto, CanonicalState), LabelCount>,
}

impl PairCounters {
    fn record(&mut self, pair: PairKey, proto: Proto, state: CanonicalState, label: Label) {
        self.per_src.entry(pair.src).or_default().record(label);
        self.per_pair.entry(pair).or_default().record(label);
        self.per_proto.entry((pair, proto)).or_default().record(label);
        self.per_state
            .entry((pair, proto, state))
            .or_default()
            .record(label);
    }

    pub fn src(&self, src: IpAddr) -> Option<&LabelCount> {
        self.per_src.get(&src)
    }

    pub fn pair(&self, pair: PairKey) -> Option<&LabelCount> {
        self.per_pair.get(&pair)
    }

    pub fn proto(&self, pair: PairKey, proto: Proto) -> Option<&LabelCount> {
        self.per_proto.get(&(pair, proto))
    }

    pub fn state(&self, pair: PairKey, proto: Proto, state: CanonicalState) -> Option<&LabelCount> {
        self.per_state.get(&(pair, proto, state))
    }

    /// Iterate the populated (pair, proto, state) buckets
    pub fn state_buckets(
        &self,
    ) -> impl Iterator<Item = (PairKey, Proto, CanonicalState, &LabelCount)> {
        self.per_state
            .iter()
            .map(|((pair, proto, state), count)| (*pair, *proto, *state, count))
    }
}

/// The four labeled (protocol, state) buckets of a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bucket {
    TcpEstablished,
    TcpNotEstablished,
    UdpEstablished,
    UdpNotEstablished,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [
        Bucket::TcpEstablished,
        Bucket::TcpNotEstablished,
        Bucket::UdpEstablished,
        Bucket::UdpNotEstablished,
    ];

    /// The bucket for a protocol/state combination, if it has one
    ///
    /// Only tcp/udp flows in Established/NotEstablished states are
    /// bucketed; everything else contributes to totals only.
    pub fn from_parts(proto: Proto, state: CanonicalState) -> Option<Bucket> {
        match (proto, state) {
            (Proto::Tcp, CanonicalState::Established) => Some(Bucket::TcpEstablished),
            (Proto::Tcp, CanonicalState::NotEstablished) => Some(Bucket::TcpNotEstablished),
            (Proto::Udp, CanonicalState::Established) => Some(Bucket::UdpEstablished),
            (Proto::Udp, CanonicalState::NotEstablished) => Some(Bucket::UdpNotEstablished),
            _ => None,
        }
    }

    const fn index(self) -> usize {
        match self {
            Bucket::TcpEstablished => 0,
            Bucket::TcpNotEstablished => 1,
            Bucket::UdpEstablished => 2,
            Bucket::UdpNotEstablished => 3,
        }
    }
}

/// Score of one (protocol, state) bucket within a pair
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BucketScore {
    /// Percentage of malicious flows among the bucket's flows
    pub percent_malicious: f64,
    /// Malicious flow count
    pub malicious: u64,
    /// Total flow count
    pub total: u64,
    /// Bucket label after thresholding
    pub label: Label,
}

impl Default for BucketScore {
    fn default() -> Self {
        Self {
            percent_malicious: 0.0,
            malicious: 0,
            total: 0,
            label: Label::Normal,
        }
    }
}

/// Preliminary verdict for one source-destination pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairVerdict {
    pub src: IpAddr,
    pub dst: IpAddr,
    buckets: [BucketScore; 4],
    /// All flows between the pair, regardless of protocol or state
    pub total_flows: u64,
    pub total_packets: u64,
    pub total_bytes: u64,
    /// Malicious iff at least one bucket label is malicious
    pub predict_label: Label,
}

impl PairVerdict {
    fn new(src: IpAddr, dst: IpAddr) -> Self {
        Self {
            src,
            dst,
            buckets: [BucketScore::default(); 4],
            total_flows: 0,
            total_packets: 0,
            total_bytes: 0,
            predict_label: Label::Normal,
        }
    }

    pub fn bucket(&self, bucket: Bucket) -> &BucketScore {
        &self.buckets[bucket.index()]
    }

    fn bucket_mut(&mut self, bucket: Bucket) -> &mut BucketScore {
        &mut self.buckets[bucket.index()]
    }

    /// Sum of the four bucket malicious counters
    pub fn malicious_flows(&self) -> u64 {
        self.buckets.iter().map(|b| b.malicious).sum()
    }
}

/// Result of the counting pass over one window's flows
#[derive(Debug, Default)]
pub struct Aggregation {
    pub counters: PairCounters,
    pub verdicts: HashMap<PairKey, PairVerdict>,
    /// Flows dropped for missing a fused label
    pub skipped_flows: u64,
}

/// First pass: build counters and per-pair totals from fused flows
///
/// Flows without a fused label are counted in `skipped_flows` and
/// otherwise ignored; one bad flow never aborts the window.
pub fn aggregate(flows: &HashMap<FlowKey, FlowRecord>) -> Aggregation {
    let mut agg = Aggregation::default();

    for (key, flow) in flows {
        let label = match flow.fused_label {
            Some(label) => label,
            None => {
                tracing::warn!(flow = %key, "flow has no fused label, skipping");
                agg.skipped_flows += 1;
                continue;
            }
        };

        let pair = PairKey::new(flow.saddr, flow.daddr);
        let state = classify(&flow.state, flow.packets);
        agg.counters.record(pair, flow.proto, state, label);

        let verdict = agg
            .verdicts
            .entry(pair)
            .or_insert_with(|| PairVerdict::new(pair.src, pair.dst));
        verdict.total_flows += 1;
        verdict.total_packets += flow.packets;
        verdict.total_bytes += flow.bytes;
    }

    agg
}

/// Second pass: fill bucket percentages and apply the labeling rule
///
/// A bucket (and with it the pair) turns malicious iff its malicious
/// percentage strictly exceeds `min_malicious_percent` and its
/// malicious count strictly exceeds `min_malicious_flows`.
pub fn score_and_label(agg: &mut Aggregation, thresholds: &PairThresholds) {
    for (pair, proto, state, count) in agg.counters.state_buckets() {
        let bucket = match Bucket::from_parts(proto, state) {
            Some(bucket) => bucket,
            None => continue,
        };
        // The pair verdict exists: the same flow that created this
        // bucket created it.
        if let Some(verdict) = agg.verdicts.get_mut(&pair) {
            let score = verdict.bucket_mut(bucket);
            score.percent_malicious = count.percent_malicious();
            score.malicious = count.malicious;
            score.total = count.total;
        }
    }

    for verdict in agg.verdicts.values_mut() {
        for bucket in Bucket::ALL {
            let score = verdict.bucket_mut(bucket);
            if score.percent_malicious > thresholds.min_malicious_percent
                && score.malicious > thresholds.min_malicious_flows
            {
                score.label = Label::Malicious;
                verdict.predict_label = Label::Malicious;
            }
        }

        let pair = PairKey::new(verdict.src, verdict.dst);
        tracing::debug!(
            pair = %pair,
            predict = %verdict.predict_label,
            src_ratio = agg.counters.src(verdict.src).map(|c| c.malicious_ratio()).unwrap_or(0.0),
            pair_ratio = agg.counters.pair(pair).map(|c| c.malicious_ratio()).unwrap_or(0.0),
            "pair scored"
        );
    }
}
