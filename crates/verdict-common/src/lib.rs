//! FlowVerdict Common - Shared types for endpoint verdict scoring
//!
//! This crate provides the value types shared by every stage of the
//! scoring pipeline:
//! - Flow records and labels
//! - Profile / window / flow identifiers
//! - Pipeline configuration
//! - Error handling

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod flow;

pub use config::*;
pub use error::*;
pub use flow::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Verdict assigned to a flow, a pair or an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    /// Traffic attributed to malicious activity
    Malicious,
    /// Benign traffic
    Normal,
}

impl Label {
    /// Whether this label is malicious
    #[inline]
    pub const fn is_malicious(&self) -> bool {
        matches!(self, Label::Malicious)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Malicious => write!(f, "malicious"),
            Label::Normal => write!(f, "normal"),
        }
    }
}

/// Opaque identifier of a monitored endpoint ("profile")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(String);

impl ProfileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of a closed monitoring window
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(String);

impl WindowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to one (profile, window) evaluation unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowRef {
    /// Endpoint the window belongs to
    pub profile: ProfileId,
    /// The closed window
    pub window: WindowId,
}

impl WindowRef {
    pub fn new(profile: impl Into<String>, window: impl Into<String>) -> Self {
        Self {
            profile: ProfileId::new(profile),
            window: WindowId::new(window),
        }
    }
}

impl fmt::Display for WindowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.profile, self.window)
    }
}
