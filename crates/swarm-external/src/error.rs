//! External bidder error types.

use std::time::Duration;

use swarm_core::BidError;
use thiserror::Error;

/// Ways an out-of-process bid can fail. Callers treat every one of them as
/// a 0.0 bid or fall back to the heuristic; none of them is retried here.
#[derive(Debug, Error)]
pub enum ExternalError {
    #[error("failed to spawn bidder `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("bidder i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("bidder timed out after {0:?}")]
    Timeout(Duration),

    #[error("bidder exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },

    #[error("malformed bidder response: {0}")]
    Malformed(String),

    #[error("bidder reported error: {0}")]
    Reported(String),

    #[error("bidder task aborted: {0}")]
    Aborted(String),

    #[error("request encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<ExternalError> for BidError {
    fn from(err: ExternalError) -> Self {
        BidError::Transport(err.to_string())
    }
}
