//! In-memory collaborators, for testing and development

use crate::store::{FlowStore, WindowEvents};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;
use verdict_common::{
    FlowKey, FlowRecord, Label, ProfileId, VerdictError, VerdictResult, WindowId, WindowRef,
};

type WindowKey = (ProfileId, WindowId);

/// In-memory flow store
#[derive(Default)]
pub struct MemoryFlowStore {
    windows: RwLock<HashMap<WindowKey, HashMap<FlowKey, FlowRecord>>>,
    fused: RwLock<HashMap<WindowKey, HashMap<FlowKey, Label>>>,
    reports: RwLock<HashSet<(ProfileId, String)>>,
}

impl MemoryFlowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed one window's flows
    pub fn insert_window(
        &self,
        profile: &ProfileId,
        window: &WindowId,
        flows: HashMap<FlowKey, FlowRecord>,
    ) {
        self.windows
            .write()
            .insert((profile.clone(), window.clone()), flows);
    }

    /// Fused labels written back for one window
    pub fn fused_labels(&self, profile: &ProfileId, window: &WindowId) -> HashMap<FlowKey, Label> {
        self.fused
            .read()
            .get(&(profile.clone(), window.clone()))
            .cloned()
            .unwrap_or_default()
    }

    /// Profiles reported malicious, with reasons
    pub fn reports(&self) -> Vec<(ProfileId, String)> {
        self.reports.read().iter().cloned().collect()
    }
}

#[async_trait]
impl FlowStore for MemoryFlowStore {
    async fn flows(
        &self,
        profile: &ProfileId,
        window: &WindowId,
    ) -> VerdictResult<HashMap<FlowKey, FlowRecord>> {
        Ok(self
            .windows
            .read()
            .get(&(profile.clone(), window.clone()))
            .cloned()
            .unwrap_or_default())
    }

    async fn classifier_labels(
        &self,
        profile: &ProfileId,
        window: &WindowId,
        flow: &FlowKey,
    ) -> VerdictResult<HashMap<String, Label>> {
        let windows = self.windows.read();
        let record = windows
            .get(&(profile.clone(), window.clone()))
            .and_then(|flows| flows.get(flow))
            .ok_or_else(|| VerdictError::Store(format!("unknown flow {}", flow)))?;
        Ok(record.classifier_labels.clone())
    }

    async fn write_fused_label(
        &self,
        profile: &ProfileId,
        window: &WindowId,
        flow: &FlowKey,
        label: Label,
    ) -> VerdictResult<()> {
        self.fused
            .write()
            .entry((profile.clone(), window.clone()))
            .or_default()
            .insert(flow.clone(), label);
        Ok(())
    }

    async fn report_malicious(&self, profile: &ProfileId, reason: &str) -> VerdictResult<()> {
        // HashSet makes repeated reports a no-op
        self.reports
            .write()
            .insert((profile.clone(), reason.to_string()));
        Ok(())
    }
}

/// Channel-backed window notifications
pub struct MemoryWindowEvents {
    receiver: mpsc::Receiver<WindowRef>,
}

impl MemoryWindowEvents {
    /// Create the notification channel and its consumer end
    pub fn channel(capacity: usize) -> (mpsc::Sender<WindowRef>, Self) {
        let (sender, receiver) = mpsc::channel(capacity);
        (sender, Self { receiver })
    }
}

#[async_trait]
impl WindowEvents for MemoryWindowEvents {
    async fn next_closed(&mut self) -> Option<WindowRef> {
        self.receiver.recv().await
    }
}
