// src/ingest/error.rs
use thiserror::Error;

/// Per-relay failure. Never fatal to a run: the collector logs it and moves on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("connect to {relay} failed: {reason}")]
    Connect { relay: String, reason: String },

    #[error("query on {relay} failed: {reason}")]
    Query { relay: String, reason: String },

    /// The relay answered the subscription with `CLOSED`.
    #[error("{relay} closed the subscription: {reason}")]
    Closed { relay: String, reason: String },

    #[error("{relay} did not finish before the deadline")]
    Timeout { relay: String },
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout { .. })
    }
}
