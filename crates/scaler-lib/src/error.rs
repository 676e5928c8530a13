//! Error types shared across the autoscaler library

use thiserror::Error;

/// Failure talking to the orchestrator
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to orchestrator failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("orchestrator returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode orchestrator response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid orchestrator URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// A policy entry that cannot be used
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("policy has an empty service name")]
    EmptyName,

    #[error("policy for {service} has an empty node label")]
    EmptyNodeLabel { service: String },

    #[error("policy for {service} has min_replicas {min} greater than max_replicas {max}")]
    InvalidBounds {
        service: String,
        min: usize,
        max: usize,
    },
}

/// Outcome of a reconciliation loop that stopped without a shutdown request
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Unrecoverable fault; the supervisor restarts the loop with fresh state
    #[error("fatal reconciliation fault: {0}")]
    Fatal(String),
}
