//! swarm-core: shared records for the decentralized bidding engine.
//!
//! Every crate in the workspace speaks in these types:
//!
//! - **`types`**: `JobDescription`, `SystemDescription`, `SystemStatus`,
//!   `Bid`, and the validated `BidContext` handed to scorers
//! - **`wire`**: JSON records exchanged with out-of-process bidders
//! - **`config`**: `swarm.toml` parsing (scorer choice, weights, caps)
//! - **`error`**: the `BidError` taxonomy

pub mod config;
pub mod error;
pub mod types;
pub mod wire;

pub use config::BidderConfig;
pub use error::{BidError, BidResult};
pub use types::*;
