//! swarm-external: bids that come from outside this process.
//!
//! Two kinds of opaque bid source plug into the engine here:
//!
//! - **`process`**: a bidder executable speaking the stdin/stdout JSON
//!   contract, run under a timeout and fanned out across candidates
//! - **`reply`**: free-text answers (e.g., from a hosted language model)
//!   that should contain `"bid_score": <number>`
//!
//! Whatever the source, [`FallbackBidder`] turns its outcome into a bid:
//! infeasible pairs still bid 0.0, and a source that fails or cannot be
//! parsed is replaced by the heuristic scorer.

pub mod error;
pub mod fallback;
pub mod process;
pub mod reply;

pub use error::ExternalError;
pub use fallback::FallbackBidder;
pub use process::{ProcessBidder, parse_response};
pub use reply::{ParsedReply, ReplyParser};
