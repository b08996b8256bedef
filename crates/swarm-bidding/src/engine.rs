//! Bid computation facade.
//!
//! `BidEngine` owns one scorer, runs it on a validated context, clamps the
//! result, and records how long the decision took.

use std::fmt::Debug;
use std::time::Instant;

use tracing::{debug, warn};

use swarm_core::config::ScorerKind;
use swarm_core::wire::BidRequest;
use swarm_core::{Bid, BidContext, BidResult, BidderConfig, sanitize_bid};

use crate::embedding::EmbeddingScorer;
use crate::feasibility::Infeasibility;
use crate::heuristic::HeuristicScorer;

/// Outcome of scoring one (job, system) pair.
#[derive(Debug, Clone, PartialEq)]
pub enum Assessment {
    /// Failed the feasibility gate. Always bids 0.0.
    Infeasible(Infeasibility),
    /// Passed the gate. `value` may still need sanitizing.
    Scored { value: f64, detail: String },
}

impl Assessment {
    /// Bid value in [0, 1].
    pub fn value(&self) -> f64 {
        match self {
            Assessment::Infeasible(_) => 0.0,
            Assessment::Scored { value, .. } => sanitize_bid(*value),
        }
    }
}

/// A bidding strategy.
///
/// Implementations must be pure: no interior mutability, no I/O, and
/// identical contexts must produce identical assessments.
pub trait BidScorer: Send + Sync + Debug {
    /// Short identifier (e.g., "heuristic").
    fn name(&self) -> &'static str;

    /// Gate and score a pair.
    fn assess(&self, ctx: &BidContext<'_>) -> BidResult<Assessment>;

    /// Bid value only.
    fn score(&self, ctx: &BidContext<'_>) -> BidResult<f64> {
        Ok(self.assess(ctx)?.value())
    }
}

/// Uniform entry point for callers: one scorer, timed and sanitized bids.
#[derive(Debug)]
pub struct BidEngine {
    scorer: Box<dyn BidScorer>,
}

impl BidEngine {
    pub fn new(scorer: impl BidScorer + 'static) -> Self {
        Self {
            scorer: Box::new(scorer),
        }
    }

    /// Build the scorer named in the config.
    pub fn from_config(config: &BidderConfig) -> Self {
        let node_check = config.feasibility.node_check;
        match config.scorer {
            ScorerKind::Heuristic => {
                Self::new(HeuristicScorer::new(config.heuristic.clone(), node_check))
            }
            ScorerKind::Embedding => {
                Self::new(EmbeddingScorer::new(config.embedding.clone(), node_check))
            }
        }
    }

    pub fn scorer(&self) -> &dyn BidScorer {
        self.scorer.as_ref()
    }

    /// Compute a bid for a validated context.
    pub fn compute(&self, ctx: &BidContext<'_>) -> BidResult<Bid> {
        let start = Instant::now();
        let assessment = self.scorer.assess(ctx)?;

        let (value, reasoning) = match assessment {
            Assessment::Infeasible(reason) => {
                debug!(
                    job = ctx.job().job_id,
                    system = %ctx.system().name,
                    %reason,
                    "infeasible pair"
                );
                (0.0, format!("infeasible: {reason}"))
            }
            Assessment::Scored { value, detail } => {
                if !value.is_finite() {
                    warn!(
                        job = ctx.job().job_id,
                        system = %ctx.system().name,
                        scorer = self.scorer.name(),
                        "non-finite score mapped to 0.0"
                    );
                }
                (sanitize_bid(value), detail)
            }
        };

        let bid = Bid {
            value,
            reasoning: Some(reasoning),
            decision_time_seconds: start.elapsed().as_secs_f64(),
        };
        debug!(
            job = ctx.job().job_id,
            system = %ctx.system().name,
            scorer = self.scorer.name(),
            bid = bid.value,
            "computed bid"
        );
        Ok(bid)
    }

    /// Validate a wire request and compute its bid.
    pub fn bid(&self, request: &BidRequest) -> BidResult<Bid> {
        let ctx = request.context()?;
        self.compute(&ctx)
    }
}

impl Default for BidEngine {
    fn default() -> Self {
        Self::new(HeuristicScorer::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{job, status, system};
    use swarm_core::BidError;

    #[derive(Debug)]
    struct Constant(f64);

    impl BidScorer for Constant {
        fn name(&self) -> &'static str {
            "constant"
        }

        fn assess(&self, _ctx: &BidContext<'_>) -> BidResult<Assessment> {
            Ok(Assessment::Scored {
                value: self.0,
                detail: "fixed".to_string(),
            })
        }
    }

    #[test]
    fn non_finite_scores_become_zero() {
        let (j, s, st) = (job(), system(), status());
        let ctx = BidContext::new(&j, &s, &st, 0.0).unwrap();
        let bid = BidEngine::new(Constant(f64::NAN)).compute(&ctx).unwrap();
        assert_eq!(bid.value, 0.0);
        assert!(!bid.is_feasible());
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        let (j, s, st) = (job(), system(), status());
        let ctx = BidContext::new(&j, &s, &st, 0.0).unwrap();
        assert_eq!(BidEngine::new(Constant(3.0)).compute(&ctx).unwrap().value, 1.0);
        assert_eq!(BidEngine::new(Constant(-1.0)).compute(&ctx).unwrap().value, 0.0);
    }

    #[test]
    fn infeasible_pair_explains_itself() {
        let (mut j, s, st) = (job(), system(), status());
        j.needs_gpu = true;
        let ctx = BidContext::new(&j, &s, &st, 0.0).unwrap();
        let bid = BidEngine::default().compute(&ctx).unwrap();
        assert_eq!(bid.value, 0.0);
        assert!(bid.reasoning.unwrap().starts_with("infeasible: needs a GPU"));
        assert!(bid.decision_time_seconds >= 0.0);
    }

    #[test]
    fn from_config_picks_scorer() {
        let mut config = BidderConfig::default();
        assert_eq!(BidEngine::from_config(&config).scorer().name(), "heuristic");
        config.scorer = ScorerKind::Embedding;
        assert_eq!(BidEngine::from_config(&config).scorer().name(), "embedding");
    }

    #[test]
    fn bid_surfaces_invalid_records() {
        let mut j = job();
        j.num_nodes = 0;
        let request = BidRequest {
            job_description: j,
            hpc_system_description: system(),
            hpc_system_status: status(),
            current_simulated_time: 0.0,
        };
        assert!(matches!(BidEngine::default().bid(&request), Err(BidError::InvalidJob(_))));
    }
}
