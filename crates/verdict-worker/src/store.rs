//! Collaborator contracts for flow storage and window notifications
//!
//! The host owns the flow database and the event bus; the worker only
//! sees these two seams. Values flowing through them are opaque.

use async_trait::async_trait;
use std::collections::HashMap;
use verdict_common::{FlowKey, FlowRecord, Label, ProfileId, VerdictResult, WindowId, WindowRef};

/// Source of "window closed" notifications
///
/// `next_closed` suspends until a window closes; `None` means the
/// host is shutting down and the worker should drain out.
#[async_trait]
pub trait WindowEvents: Send {
    async fn next_closed(&mut self) -> Option<WindowRef>;
}

/// Flow/profile storage collaborator
#[async_trait]
pub trait FlowStore: Send + Sync {
    /// All flows of one (profile, window); may be empty
    async fn flows(
        &self,
        profile: &ProfileId,
        window: &WindowId,
    ) -> VerdictResult<HashMap<FlowKey, FlowRecord>>;

    /// Raw per-classifier labels for one flow
    async fn classifier_labels(
        &self,
        profile: &ProfileId,
        window: &WindowId,
        flow: &FlowKey,
    ) -> VerdictResult<HashMap<String, Label>>;

    /// Persist the fused label Phase 1 computed for one flow
    async fn write_fused_label(
        &self,
        profile: &ProfileId,
        window: &WindowId,
        flow: &FlowKey,
        label: Label,
    ) -> VerdictResult<()>;

    /// Mark a profile malicious with an attributable reason; idempotent
    async fn report_malicious(&self, profile: &ProfileId, reason: &str) -> VerdictResult<()>;
}
