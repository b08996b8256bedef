//! Multi-factor heuristic scorer.
//!
//! The bid is the product of six factors, each in [0, 1]:
//!
//! ```text
//! utilization  = 1 - used_nodes / num_nodes
//! node_compat  = min(1, available_nodes / requested_nodes)
//! queue        = max(queue_floor, 1 - queue_step · queue_length)
//! resource     = type-compatibility level
//! site         = locality level (network / data-transfer cost proxy)
//! delay        = max(delay_floor, exp(-α · max(0, start_estimate - now)))
//!
//! bid = round(clamp(product, 0, 1), precision)
//! ```
//!
//! The site factor models the cost of moving a job and its data away from
//! where it was submitted. It is not a preference for "home" scheduling and
//! can be switched off (`site_affinity = false`) without touching the rest.

use swarm_core::config::{HeuristicWeights, NodeCapacityCheck};
use swarm_core::{
    BidContext, BidResult, JobDescription, ResourceType, SystemDescription, SystemStatus,
};

use crate::engine::{Assessment, BidScorer};
use crate::feasibility::check_context;

/// Individual factors behind a heuristic bid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicBreakdown {
    pub utilization: f64,
    pub node_compat: f64,
    pub queue: f64,
    pub resource: f64,
    pub site: f64,
    pub delay: f64,
}

impl HeuristicBreakdown {
    pub fn product(&self) -> f64 {
        self.utilization * self.node_compat * self.queue * self.resource * self.site * self.delay
    }
}

/// Scorer built from [`HeuristicWeights`].
#[derive(Debug, Clone, Default)]
pub struct HeuristicScorer {
    weights: HeuristicWeights,
    node_check: NodeCapacityCheck,
}

impl HeuristicScorer {
    pub fn new(weights: HeuristicWeights, node_check: NodeCapacityCheck) -> Self {
        Self { weights, node_check }
    }

    pub fn weights(&self) -> &HeuristicWeights {
        &self.weights
    }

    /// Compute every factor. Does not run the feasibility gate.
    pub fn breakdown(&self, ctx: &BidContext<'_>) -> HeuristicBreakdown {
        let (job, system, status) = (ctx.job(), ctx.system(), ctx.status());
        HeuristicBreakdown {
            utilization: utilization_score(system, status),
            node_compat: node_compatibility(status.current_num_available_nodes, job.num_nodes),
            queue: queue_factor(status.queue_length, &self.weights),
            resource: resource_factor(&job.job_type, &system.kind, &self.weights),
            site: site_factor(job, system, &self.weights),
            delay: delay_penalty(ctx.expected_wait(), &self.weights),
        }
    }
}

impl BidScorer for HeuristicScorer {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn assess(&self, ctx: &BidContext<'_>) -> BidResult<Assessment> {
        if let Some(reason) = check_context(ctx, self.node_check) {
            return Ok(Assessment::Infeasible(reason));
        }

        let b = self.breakdown(ctx);
        let value = round_to(b.product().clamp(0.0, 1.0), self.weights.precision);
        let detail = format!(
            "utilization={:.3} node_compat={:.3} queue={:.3} resource={:.3} site={:.3} delay={:.3}",
            b.utilization, b.node_compat, b.queue, b.resource, b.site, b.delay
        );
        Ok(Assessment::Scored { value, detail })
    }
}

/// Share of idle nodes. Rewards lightly loaded systems.
pub fn utilization_score(system: &SystemDescription, status: &SystemStatus) -> f64 {
    if system.num_nodes == 0 {
        return 0.0;
    }
    1.0 - status.used_nodes(system) as f64 / system.num_nodes as f64
}

/// How much of the request fits right now, capped at 1. A zero-node
/// request counts as fully compatible.
pub fn node_compatibility(available: u64, requested: u64) -> f64 {
    if requested == 0 {
        return 1.0;
    }
    (available as f64 / requested as f64).min(1.0)
}

/// Never reaches zero, so a long queue only dampens the bid.
pub fn queue_factor(queue_length: u64, weights: &HeuristicWeights) -> f64 {
    (1.0 - weights.queue_step * queue_length as f64).max(weights.queue_floor)
}

pub fn resource_factor(
    job_type: &ResourceType,
    system_type: &ResourceType,
    weights: &HeuristicWeights,
) -> f64 {
    let job_storage = *job_type == ResourceType::Storage;
    let system_storage = *system_type == ResourceType::Storage;

    if job_type == system_type {
        weights.exact_type
    } else if job_type.is_compute() && system_type.is_compute() {
        weights.compatible_type
    } else if job_storage != system_storage {
        weights.storage_mismatch
    } else {
        weights.default_type
    }
}

pub fn site_factor(
    job: &JobDescription,
    system: &SystemDescription,
    weights: &HeuristicWeights,
) -> f64 {
    if !weights.site_affinity {
        return 1.0;
    }
    if job.hpc_site != system.site {
        weights.cross_site
    } else if job.hpc_system == system.name {
        weights.same_system
    } else {
        weights.same_site
    }
}

/// Exponential decay in the expected wait before the job starts.
pub fn delay_penalty(wait: f64, weights: &HeuristicWeights) -> f64 {
    (-weights.delay_decay * wait.max(0.0)).exp().max(weights.delay_floor)
}

/// Round to `precision` decimals, exact halves to even.
fn round_to(value: f64, precision: u32) -> f64 {
    let scale = 10f64.powi(precision as i32);
    (value * scale).round_ties_even() / scale
}
