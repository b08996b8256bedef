//! Turning external outcomes into bids.
//!
//! External sources never bypass the feasibility gate: an infeasible pair
//! bids 0.0 whatever the source says. Feasible pairs take the external
//! value clamped to [0, 1]. When the source fails or its answer cannot be
//! read, the heuristic scorer bids instead.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use swarm_bidding::{BidEngine, HeuristicScorer, check_feasibility};
use swarm_core::config::{HeuristicWeights, NodeCapacityCheck};
use swarm_core::wire::BidResponse;
use swarm_core::{Bid, BidContext, BidResult, BidderConfig, sanitize_bid};

use crate::error::ExternalError;
use crate::reply::ReplyParser;

#[derive(Debug)]
pub struct FallbackBidder {
    parser: ReplyParser,
    heuristic: BidEngine,
    node_check: NodeCapacityCheck,
}

impl FallbackBidder {
    pub fn new(
        weights: HeuristicWeights,
        node_check: NodeCapacityCheck,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            parser: ReplyParser::new()?,
            heuristic: BidEngine::new(HeuristicScorer::new(weights, node_check)),
            node_check,
        })
    }

    pub fn from_config(config: &BidderConfig) -> Result<Self, regex::Error> {
        Self::new(config.heuristic.clone(), config.feasibility.node_check)
    }

    /// The 0.0 bid for an infeasible pair, or `None` if the pair may be
    /// offered to an external source.
    pub fn gate(&self, ctx: &BidContext<'_>) -> Option<Bid> {
        let start = Instant::now();
        let reason = check_feasibility(ctx.job(), ctx.system(), ctx.status(), self.node_check)?;
        debug!(
            job = ctx.job().job_id,
            system = %ctx.system().name,
            %reason,
            "infeasible pair, external source skipped"
        );
        Some(Bid {
            value: 0.0,
            reasoning: Some(format!("infeasible: {reason}")),
            decision_time_seconds: start.elapsed().as_secs_f64(),
        })
    }

    /// Resolve a free-text reply that took `elapsed` to produce.
    pub fn resolve_reply(
        &self,
        ctx: &BidContext<'_>,
        reply: &str,
        elapsed: Duration,
    ) -> BidResult<Bid> {
        if let Some(bid) = self.gate(ctx) {
            return Ok(bid);
        }
        let spent = elapsed.as_secs_f64();
        match self.parser.parse(reply) {
            Some(parsed) => Ok(self.accept(ctx, parsed.bid, parsed.reasoning, spent)),
            None => self.fall_back(ctx, "reply carried no bid_score", spent),
        }
    }

    /// Resolve the outcome of a subprocess bidder that ran for `elapsed`.
    ///
    /// A successful response keeps its self-reported timing. A failed one
    /// is charged `elapsed` plus the heuristic's own time.
    pub fn resolve_response(
        &self,
        ctx: &BidContext<'_>,
        outcome: Result<BidResponse, ExternalError>,
        elapsed: Duration,
    ) -> BidResult<Bid> {
        if let Some(bid) = self.gate(ctx) {
            return Ok(bid);
        }
        match outcome {
            Ok(response) => {
                let spent = non_negative(response.bid_generation_time_seconds);
                Ok(self.accept(ctx, response.bid, response.reasoning, spent))
            }
            Err(err) => self.fall_back(ctx, &err.to_string(), elapsed.as_secs_f64()),
        }
    }

    fn accept(
        &self,
        ctx: &BidContext<'_>,
        value: f64,
        reasoning: Option<String>,
        spent: f64,
    ) -> Bid {
        let clamped = sanitize_bid(value);
        if clamped != value {
            warn!(
                job = ctx.job().job_id,
                system = %ctx.system().name,
                reported = value,
                clamped,
                "external bid outside [0, 1]"
            );
        }
        Bid {
            value: clamped,
            reasoning,
            decision_time_seconds: spent,
        }
    }

    fn fall_back(&self, ctx: &BidContext<'_>, why: &str, spent: f64) -> BidResult<Bid> {
        warn!(
            job = ctx.job().job_id,
            system = %ctx.system().name,
            reason = why,
            "external bid unusable, using heuristic"
        );
        let mut bid = self.heuristic.compute(ctx)?;
        bid.decision_time_seconds += spent;
        bid.reasoning = Some(match bid.reasoning.take() {
            Some(detail) => format!("fallback ({why}): {detail}"),
            None => format!("fallback ({why})"),
        });
        Ok(bid)
    }
}

fn non_negative(seconds: f64) -> f64 {
    if seconds.is_finite() && seconds > 0.0 { seconds } else { 0.0 }
}
