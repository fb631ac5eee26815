//! Flow records and canonical connection states

use crate::Label;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;

/// Transport protocol of a flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Proto {
    Tcp,
    Udp,
    /// Any other transport (icmp, arp, ...); counted but never bucketed
    Other,
}

impl Proto {
    /// Parse an exporter protocol string; anything unrecognized is Other
    pub fn parse(s: &str) -> Self {
        match s {
            "tcp" | "TCP" => Proto::Tcp,
            "udp" | "UDP" => Proto::Udp,
            _ => Proto::Other,
        }
    }
}

impl fmt::Display for Proto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Proto::Tcp => write!(f, "tcp"),
            Proto::Udp => write!(f, "udp"),
            Proto::Other => write!(f, "other"),
        }
    }
}

/// Canonical connection state shared by all exporter dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CanonicalState {
    Established,
    NotEstablished,
    IcmpEcho,
    IcmpReply,
    IcmpHostUnreachable,
    IcmpPortUnreachable,
    /// State token carried no usable information
    Undetermined,
}

impl fmt::Display for CanonicalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CanonicalState::Established => "Established",
            CanonicalState::NotEstablished => "NotEstablished",
            CanonicalState::IcmpEcho => "ICMPEcho",
            CanonicalState::IcmpReply => "ICMPReply",
            CanonicalState::IcmpHostUnreachable => "ICMPHostUnreachable",
            CanonicalState::IcmpPortUnreachable => "ICMPPortUnreachable",
            CanonicalState::Undetermined => "Undetermined",
        };
        write!(f, "{}", s)
    }
}

/// Opaque per-window identifier of one flow
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowKey(String);

impl FlowKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One observed connection inside a monitoring window
///
/// Produced by the flow-collection layer; read-only to the pipeline
/// except for `fused_label`, which Phase 1 computes and writes back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowRecord {
    /// Source address
    pub saddr: IpAddr,
    /// Destination address
    pub daddr: IpAddr,
    /// Transport protocol
    pub proto: Proto,
    /// Raw exporter connection-state token
    pub state: String,
    /// Packet count
    pub packets: u64,
    /// Total byte count
    pub bytes: u64,
    /// Raw per-classifier labels for this flow
    #[serde(default)]
    pub classifier_labels: HashMap<String, Label>,
    /// Fused label computed by Phase 1
    #[serde(default)]
    pub fused_label: Option<Label>,
}

impl FlowRecord {
    pub fn new(saddr: IpAddr, daddr: IpAddr, proto: Proto, state: impl Into<String>) -> Self {
        Self {
            saddr,
            daddr,
            proto,
            state: state.into(),
            packets: 0,
            bytes: 0,
            classifier_labels: HashMap::new(),
            fused_label: None,
        }
    }

    /// Set packet/byte totals
    pub fn with_volume(mut self, packets: u64, bytes: u64) -> Self {
        self.packets = packets;
        self.bytes = bytes;
        self
    }

    /// Add one classifier's raw label
    pub fn with_label(mut self, classifier: &str, label: Label) -> Self {
        self.classifier_labels.insert(classifier.to_string(), label);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proto_parse() {
        assert_eq!(Proto::parse("tcp"), Proto::Tcp);
        assert_eq!(Proto::parse("UDP"), Proto::Udp);
        assert_eq!(Proto::parse("icmp"), Proto::Other);
        assert_eq!(Proto::parse(""), Proto::Other);
    }

    #[test]
    fn test_flow_builder() {
        let flow = FlowRecord::new(
            "10.0.0.1".parse().unwrap(),
            "1.2.3.4".parse().unwrap(),
            Proto::Tcp,
            "SA_SA",
        )
        .with_volume(12, 2048)
        .with_label("flow_ml", Label::Malicious);

        assert_eq!(flow.packets, 12);
        assert_eq!(flow.bytes, 2048);
        assert_eq!(flow.classifier_labels["flow_ml"], Label::Malicious);
        assert!(flow.fused_label.is_none());
    }
}
