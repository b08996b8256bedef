//! swarm-bidding: per-system bids and auction clearing.
//!
//! Every function here is pure: the same inputs always yield the same bid,
//! there is no shared state, and nothing blocks. Callers may score many
//! (job, system) pairs in parallel.
//!
//! # Components
//!
//! - **`feasibility`**: hard pass/fail gate shared by every scorer
//! - **`heuristic`**: multi-factor product score (utilization, fit, queue, type, locality, delay)
//! - **`embedding`**: cosine similarity of job/system feature vectors blended with live headroom
//! - **`engine`**: `BidScorer` trait and the `BidEngine` facade (timing, sanitizing)
//! - **`selector`**: arg-max over candidate bids, first-seen wins ties
//!
//! ```text
//! caller → BidEngine ─┬─ HeuristicScorer ─┐
//!                     └─ EmbeddingScorer ─┴─ feasibility gate → bid ∈ [0, 1]
//!                                                                 │
//!                                                    selector ◄───┘
//! ```

pub mod embedding;
pub mod engine;
pub mod feasibility;
pub mod heuristic;
pub mod selector;

pub use embedding::{Embedding, EmbeddingScorer, embed_job, embed_system};
pub use engine::{Assessment, BidEngine, BidScorer};
pub use feasibility::{Infeasibility, check_feasibility, feasible};
pub use heuristic::{HeuristicBreakdown, HeuristicScorer};
pub use selector::{Candidate, CandidateBid, rank, select, select_from_bids};
