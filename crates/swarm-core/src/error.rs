//! Bid error types.

use thiserror::Error;

/// Errors surfaced to callers of the bidding engine.
///
/// Infeasible (job, system) pairs are not errors; they produce a 0.0 bid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BidError {
    /// Missing, malformed, or out-of-range job field.
    #[error("invalid job: {0}")]
    InvalidJob(String),

    /// Missing, malformed, or out-of-range system description or status field.
    #[error("invalid system: {0}")]
    InvalidSystem(String),

    /// The request never reached a scorer (bad JSON, dead bidder process).
    #[error("transport failure: {0}")]
    Transport(String),
}

impl From<serde_json::Error> for BidError {
    fn from(err: serde_json::Error) -> Self {
        BidError::Transport(err.to_string())
    }
}

pub type BidResult<T> = Result<T, BidError>;
