//! Worker loop integration tests

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use verdict_common::{
    EnsembleConfig, FlowKey, FlowRecord, GroupThresholds, Label, ProfileId, Proto, VerdictError,
    VerdictResult, WindowId, WindowRef,
};
use verdict_intel::{ReputationProvider, ReputationSignals, StaticReputation};
use verdict_worker::{EnsembleWorker, MemoryFlowStore, MemoryWindowEvents, REPORT_REASON};

fn addr(s: &str) -> IpAddr {
    s.parse().unwrap()
}

/// tcp-established flows to several destinations, unanimous labels
fn seeded_window(src: &str, dsts: usize, malicious_per_dst: usize, total_per_dst: usize) -> HashMap<FlowKey, FlowRecord> {
    let mut flows = HashMap::new();
    for d in 0..dsts {
        for i in 0..total_per_dst {
            let label = if i < malicious_per_dst { Label::Malicious } else { Label::Normal };
            let flow = FlowRecord::new(
                addr(src),
                addr(&format!("1.1.1.{}", d + 1)),
                Proto::Tcp,
                "SA_SA",
            )
            .with_volume(6, 700)
            .with_label("anomaly", label)
            .with_label("flow_ml", label)
            .with_label("signature", label);
            flows.insert(FlowKey::new(format!("d{}f{}", d, i)), flow);
        }
    }
    flows
}

#[tokio::test]
async fn worker_reports_malicious_endpoint_and_writes_fused_labels() {
    let store = Arc::new(MemoryFlowStore::new());
    let profile = ProfileId::new("profile_10.0.0.1");
    let window = WindowId::new("tw1");
    // 6 half-malicious destinations: group confidence 0.55 meets a
    // 0.5 decision threshold without any reputation.
    store.insert_window(&profile, &window, seeded_window("10.0.0.1", 6, 5, 10));

    let (sender, events) = MemoryWindowEvents::channel(4);
    sender.send(WindowRef::new("profile_10.0.0.1", "tw1")).await.unwrap();
    drop(sender);

    let mut config = EnsembleConfig::default();
    config.decision_threshold = 0.5;
    let worker = EnsembleWorker::new(
        config,
        events,
        store.clone(),
        Arc::new(StaticReputation::new()),
    )
    .unwrap();

    let stats = worker.run().await;

    assert_eq!(stats.windows_processed, 1);
    assert_eq!(stats.windows_failed, 0);
    assert_eq!(stats.reports_emitted, 1);

    let fused = store.fused_labels(&profile, &window);
    assert_eq!(fused.len(), 60);
    assert_eq!(fused[&FlowKey::new("d0f0")], Label::Malicious);
    assert_eq!(fused[&FlowKey::new("d0f9")], Label::Normal);

    let reports = store.reports();
    assert_eq!(reports, vec![(profile.clone(), REPORT_REASON.to_string())]);
}

#[tokio::test]
async fn worker_survives_a_failing_window() {
    let store = Arc::new(MemoryFlowStore::new());
    let profile = ProfileId::new("p");

    // First window carries a classifier the weight table does not
    // know: a configuration error that fails that window only.
    let mut bad_flows = HashMap::new();
    bad_flows.insert(
        FlowKey::new("f0"),
        FlowRecord::new(addr("10.0.0.1"), addr("1.1.1.1"), Proto::Tcp, "SA_SA")
            .with_label("mystery", Label::Malicious),
    );
    store.insert_window(&profile, &WindowId::new("tw1"), bad_flows);
    store.insert_window(&profile, &WindowId::new("tw2"), seeded_window("10.0.0.1", 1, 0, 5));

    let (sender, events) = MemoryWindowEvents::channel(4);
    sender.send(WindowRef::new("p", "tw1")).await.unwrap();
    sender.send(WindowRef::new("p", "tw2")).await.unwrap();
    drop(sender);

    let worker = EnsembleWorker::new(
        EnsembleConfig::default(),
        events,
        store.clone(),
        Arc::new(StaticReputation::new()),
    )
    .unwrap();
    let stats = worker.run().await;

    assert_eq!(stats.windows_failed, 1);
    assert_eq!(stats.windows_processed, 1);
    assert!(store.reports().is_empty());
}

#[tokio::test]
async fn worker_fails_open_when_reputation_is_down() {
    struct DownProvider;

    #[async_trait::async_trait]
    impl ReputationProvider for DownProvider {
        async fn lookup(&self, addr: IpAddr) -> VerdictResult<ReputationSignals> {
            Err(VerdictError::Reputation(format!("{} unreachable", addr)))
        }
    }

    let store = Arc::new(MemoryFlowStore::new());
    let profile = ProfileId::new("p");
    store.insert_window(&profile, &WindowId::new("tw1"), seeded_window("10.0.0.1", 6, 5, 10));

    let (sender, events) = MemoryWindowEvents::channel(2);
    sender.send(WindowRef::new("p", "tw1")).await.unwrap();
    drop(sender);

    let mut config = EnsembleConfig::default();
    config.decision_threshold = 0.5;
    let worker =
        EnsembleWorker::new(config, events, store.clone(), Arc::new(DownProvider)).unwrap();
    let stats = worker.run().await;

    // Zero-signal reputation still lets group confidence convict
    assert_eq!(stats.windows_processed, 1);
    assert_eq!(stats.reports_emitted, 1);
}

#[tokio::test]
async fn worker_skips_empty_windows() {
    let store = Arc::new(MemoryFlowStore::new());
    let (sender, events) = MemoryWindowEvents::channel(2);
    sender.send(WindowRef::new("p", "tw-empty")).await.unwrap();
    drop(sender);

    let worker = EnsembleWorker::new(
        EnsembleConfig::default(),
        events,
        store.clone(),
        Arc::new(StaticReputation::new()),
    )
    .unwrap();
    let stats = worker.run().await;

    assert_eq!(stats.windows_processed, 1);
    assert_eq!(stats.reports_emitted, 0);
    assert!(store.reports().is_empty());
}

#[tokio::test]
async fn worker_counts_flows_without_labels() {
    let store = Arc::new(MemoryFlowStore::new());
    let profile = ProfileId::new("p");

    let mut flows = seeded_window("10.0.0.1", 1, 0, 3);
    flows.insert(
        FlowKey::new("unlabeled"),
        FlowRecord::new(addr("10.0.0.1"), addr("1.1.1.1"), Proto::Tcp, "SA_SA"),
    );
    store.insert_window(&profile, &WindowId::new("tw1"), flows);

    let (sender, events) = MemoryWindowEvents::channel(2);
    sender.send(WindowRef::new("p", "tw1")).await.unwrap();
    drop(sender);

    let worker = EnsembleWorker::new(
        EnsembleConfig::default(),
        events,
        store.clone(),
        Arc::new(StaticReputation::new()),
    )
    .unwrap();
    let stats = worker.run().await;

    assert_eq!(stats.windows_processed, 1);
    assert_eq!(stats.flows_skipped, 1);
    // The three labeled flows were still fused and written back
    assert_eq!(store.fused_labels(&profile, &WindowId::new("tw1")).len(), 3);
}

#[tokio::test]
async fn invalid_config_fails_at_startup() {
    let (_sender, events) = MemoryWindowEvents::channel(1);
    let mut config = EnsembleConfig::default();
    config.group_thresholds = GroupThresholds { t1: 5, t2: 5, t3: 20 };

    let result = EnsembleWorker::new(
        config,
        events,
        Arc::new(MemoryFlowStore::new()),
        Arc::new(StaticReputation::new()),
    );
    assert!(matches!(result, Err(VerdictError::Config(_))));
}
