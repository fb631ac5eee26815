//! Error types for FlowVerdict

use thiserror::Error;

/// FlowVerdict error type
#[derive(Error, Debug)]
pub enum VerdictError {
    /// Invalid configuration; fatal at startup, never defaulted away
    #[error("config error: {0}")]
    Config(String),

    /// Malformed flow data; the offending flow is skipped, the window continues
    #[error("flow data error: {0}")]
    Data(String),

    /// Flow/profile storage collaborator failure
    #[error("store error: {0}")]
    Store(String),

    /// Reputation collaborator failure; handled fail-open by callers
    #[error("reputation lookup failed: {0}")]
    Reputation(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for FlowVerdict
pub type VerdictResult<T> = Result<T, VerdictError>;
