//! End-to-end scoring scenarios over the full pipeline

use std::collections::HashMap;
use std::net::IpAddr;
use verdict_common::{EnsembleConfig, FlowKey, FlowRecord, Label, Proto};
use verdict_ensemble::{Bucket, EnsemblePipeline, PairKey};
use verdict_intel::ReputationSignals;

fn addr(s: &str) -> IpAddr {
    s.parse().unwrap()
}

/// A window of tcp-established flows from one source to one
/// destination, with classifier labels already attached
fn window(src: &str, dst: &str, malicious: usize, total: usize) -> HashMap<FlowKey, FlowRecord> {
    let mut flows = HashMap::new();
    for i in 0..total {
        let label = if i < malicious { Label::Malicious } else { Label::Normal };
        let flow = FlowRecord::new(addr(src), addr(dst), Proto::Tcp, "SA_SA")
            .with_volume(8, 900)
            .with_label("anomaly", label)
            .with_label("flow_ml", label)
            .with_label("signature", label);
        flows.insert(FlowKey::new(format!("flow{}", i)), flow);
    }
    flows
}

/// Phase 1 over a whole window, as the worker would run it
fn fuse_all(pipeline: &EnsemblePipeline, flows: &mut HashMap<FlowKey, FlowRecord>) {
    for flow in flows.values_mut() {
        let fused = pipeline.fuse_flow(&flow.classifier_labels).unwrap();
        flow.fused_label = Some(fused);
    }
}

#[test]
fn scenario_a_thirty_percent_malicious_convicts_pair() {
    // 10 tcp-established flows, 3 malicious, thresholds (0, 25):
    // 30% > 25% and 3 > 0, so the bucket and the pair turn malicious.
    let pipeline = EnsemblePipeline::new(EnsembleConfig::default()).unwrap();
    let mut flows = window("10.0.0.1", "1.1.1.1", 3, 10);
    fuse_all(&pipeline, &mut flows);

    let verdict = pipeline.evaluate(&flows, &HashMap::new());
    let pair = &verdict.pairs[&PairKey::new(addr("10.0.0.1"), addr("1.1.1.1"))];

    assert_eq!(pair.bucket(Bucket::TcpEstablished).percent_malicious, 30.0);
    assert_eq!(pair.bucket(Bucket::TcpEstablished).label, Label::Malicious);
    assert_eq!(pair.predict_label, Label::Malicious);
}

#[test]
fn scenario_b_raised_percent_threshold_acquits_pair() {
    let mut config = EnsembleConfig::default();
    config.pair_thresholds.min_malicious_percent = 40.0;
    let pipeline = EnsemblePipeline::new(config).unwrap();

    let mut flows = window("10.0.0.1", "1.1.1.1", 3, 10);
    fuse_all(&pipeline, &mut flows);

    let verdict = pipeline.evaluate(&flows, &HashMap::new());
    let pair = &verdict.pairs[&PairKey::new(addr("10.0.0.1"), addr("1.1.1.1"))];

    assert_eq!(pair.bucket(Bucket::TcpEstablished).label, Label::Normal);
    assert_eq!(pair.predict_label, Label::Normal);
}

#[test]
fn scenario_c_weighted_vote_resolves_normal() {
    // malicious weight 1+1=2 against normal weight 3
    let pipeline = EnsemblePipeline::new(EnsembleConfig::default()).unwrap();
    let labels: HashMap<String, Label> = [
        ("anomaly".to_string(), Label::Malicious),
        ("flow_ml".to_string(), Label::Normal),
        ("signature".to_string(), Label::Malicious),
    ]
    .into_iter()
    .collect();

    assert_eq!(pipeline.fuse_flow(&labels).unwrap(), Label::Normal);
}

#[test]
fn scenario_d_six_malicious_groups_convict_on_group_confidence_alone() {
    // 6 malicious pairs with thresholds (1, 5, 20) put group confidence
    // at 0.55; zero reputation and a 0.5 decision threshold still
    // convict the endpoint.
    let mut config = EnsembleConfig::default();
    config.decision_threshold = 0.5;
    let pipeline = EnsemblePipeline::new(config).unwrap();

    let mut flows = HashMap::new();
    for d in 0..6 {
        let dst = format!("1.1.1.{}", d + 1);
        for (key, flow) in window("10.0.0.1", &dst, 5, 10) {
            flows.insert(FlowKey::new(format!("{}-{}", d, key)), flow);
        }
    }
    fuse_all(&pipeline, &mut flows);

    let verdict = pipeline.evaluate(&flows, &HashMap::new());
    let endpoint = &verdict.endpoints[&addr("10.0.0.1")];

    assert_eq!(endpoint.malicious_pairs, 6);
    assert_eq!(endpoint.group_confidence, 0.55);
    assert_eq!(endpoint.reputation_confidence, 0.0);
    assert_eq!(endpoint.label, Label::Malicious);
    assert_eq!(verdict.malicious_sources, vec![addr("10.0.0.1")]);
}

#[test]
fn reputation_tips_a_borderline_endpoint() {
    // One malicious pair alone gives 0.5, short of the default 0.55
    // threshold; download reputation on the destination closes the gap.
    let pipeline = EnsemblePipeline::new(EnsembleConfig::default()).unwrap();
    let mut flows = window("10.0.0.1", "1.1.1.1", 3, 10);
    fuse_all(&pipeline, &mut flows);

    let verdict = pipeline.evaluate(&flows, &HashMap::new());
    assert_eq!(verdict.endpoints[&addr("10.0.0.1")].label, Label::Normal);

    let mut reputation = HashMap::new();
    // 0.8 * 0.0625 = 0.05 of download contribution
    reputation.insert(addr("1.1.1.1"), ReputationSignals::new(0.0, 0.0625, 0.0, 0.0));
    let verdict = pipeline.evaluate(&flows, &reputation);
    let endpoint = &verdict.endpoints[&addr("10.0.0.1")];

    assert_eq!(endpoint.group_confidence, 0.5);
    assert!((endpoint.reputation_confidence - 0.05).abs() < 1e-9);
    assert_eq!(endpoint.label, Label::Malicious);
}

#[test]
fn mixed_protocol_window_buckets_independently() {
    let pipeline = EnsemblePipeline::new(EnsembleConfig::default()).unwrap();
    let mut flows = HashMap::new();

    // udp not-established scan traffic, all malicious
    for i in 0..4 {
        let flow = FlowRecord::new(addr("10.0.0.1"), addr("1.1.1.1"), Proto::Udp, "INT")
            .with_volume(1, 60)
            .with_label("anomaly", Label::Malicious)
            .with_label("flow_ml", Label::Malicious)
            .with_label("signature", Label::Malicious);
        flows.insert(FlowKey::new(format!("udp{}", i)), flow);
    }
    // clean tcp traffic to the same destination
    for i in 0..4 {
        let flow = FlowRecord::new(addr("10.0.0.1"), addr("1.1.1.1"), Proto::Tcp, "SA_SA")
            .with_volume(20, 4000)
            .with_label("anomaly", Label::Normal)
            .with_label("flow_ml", Label::Normal)
            .with_label("signature", Label::Normal);
        flows.insert(FlowKey::new(format!("tcp{}", i)), flow);
    }
    fuse_all(&pipeline, &mut flows);

    let verdict = pipeline.evaluate(&flows, &HashMap::new());
    let pair = &verdict.pairs[&PairKey::new(addr("10.0.0.1"), addr("1.1.1.1"))];

    assert_eq!(pair.bucket(Bucket::UdpNotEstablished).label, Label::Malicious);
    assert_eq!(pair.bucket(Bucket::TcpEstablished).label, Label::Normal);
    assert_eq!(pair.predict_label, Label::Malicious);
    assert_eq!(pair.total_flows, 8);
}

#[test]
fn empty_window_produces_no_verdicts() {
    let pipeline = EnsemblePipeline::new(EnsembleConfig::default()).unwrap();
    let verdict = pipeline.evaluate(&HashMap::new(), &HashMap::new());
    assert!(verdict.pairs.is_empty());
    assert!(verdict.endpoints.is_empty());
    assert!(verdict.malicious_sources.is_empty());
}
