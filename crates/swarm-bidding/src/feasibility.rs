//! Hard feasibility gate.
//!
//! A pair is infeasible if **any** check fails. Every scorer runs this gate
//! before scoring and bids exactly 0.0 on failure.

use std::fmt;

use swarm_core::config::NodeCapacityCheck;
use swarm_core::{BidContext, JobDescription, SystemDescription, SystemStatus};

/// First failed check for a (job, system) pair.
#[derive(Debug, Clone, PartialEq)]
pub enum Infeasibility {
    TooManyNodes { requested: u64, limit: u64 },
    GpuUnavailable,
    InsufficientMemory { requested_gb: f64, capacity_gb: f64 },
    InsufficientStorage { requested_gb: f64, capacity_gb: f64 },
    NonPositiveWalltime { walltime: f64 },
}

impl fmt::Display for Infeasibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Infeasibility::TooManyNodes { requested, limit } => {
                write!(f, "requests {requested} nodes, limit is {limit}")
            }
            Infeasibility::GpuUnavailable => f.write_str("needs a GPU, system has none"),
            Infeasibility::InsufficientMemory {
                requested_gb,
                capacity_gb,
            } => write!(f, "requests {requested_gb} GB memory, system total is {capacity_gb} GB"),
            Infeasibility::InsufficientStorage {
                requested_gb,
                capacity_gb,
            } => write!(f, "requests {requested_gb} GB storage, system has {capacity_gb} GB"),
            Infeasibility::NonPositiveWalltime { walltime } => {
                write!(f, "walltime {walltime} is not positive")
            }
        }
    }
}

/// Run every check and report the first failure, or `None` if the job fits.
pub fn check_feasibility(
    job: &JobDescription,
    system: &SystemDescription,
    status: &SystemStatus,
    node_check: NodeCapacityCheck,
) -> Option<Infeasibility> {
    let node_limit = match node_check {
        NodeCapacityCheck::Total => system.num_nodes,
        NodeCapacityCheck::Available => status.current_num_available_nodes,
    };
    if job.num_nodes > node_limit {
        return Some(Infeasibility::TooManyNodes {
            requested: job.num_nodes,
            limit: node_limit,
        });
    }

    if job.needs_gpu && !system.has_gpu {
        return Some(Infeasibility::GpuUnavailable);
    }

    // Job memory is a total; system memory is per node.
    let capacity_gb = system.total_memory_gb();
    if job.requested_memory_gb > capacity_gb {
        return Some(Infeasibility::InsufficientMemory {
            requested_gb: job.requested_memory_gb,
            capacity_gb,
        });
    }

    let storage_gb = system.storage_capacity_gb();
    if job.requested_storage_gb > storage_gb {
        return Some(Infeasibility::InsufficientStorage {
            requested_gb: job.requested_storage_gb,
            capacity_gb: storage_gb,
        });
    }

    if job.walltime <= 0.0 {
        return Some(Infeasibility::NonPositiveWalltime {
            walltime: job.walltime,
        });
    }

    None
}

/// `true` when the pair passes every check against total capacity.
pub fn feasible(job: &JobDescription, system: &SystemDescription, status: &SystemStatus) -> bool {
    check_feasibility(job, system, status, NodeCapacityCheck::Total).is_none()
}

pub(crate) fn check_context(
    ctx: &BidContext<'_>,
    node_check: NodeCapacityCheck,
) -> Option<Infeasibility> {
    check_feasibility(ctx.job(), ctx.system(), ctx.status(), node_check)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{job, status, system};

    #[test]
    fn accepts_fitting_job() {
        assert!(feasible(&job(), &system(), &status()));
    }

    #[test]
    fn rejects_too_many_nodes_against_total() {
        let mut j = job();
        j.num_nodes = 201;
        assert_eq!(
            check_feasibility(&j, &system(), &status(), NodeCapacityCheck::Total),
            Some(Infeasibility::TooManyNodes {
                requested: 201,
                limit: 200
            })
        );
    }

    #[test]
    fn available_check_is_stricter_than_total() {
        // 100 requested, 50 free, 200 total.
        let (j, s, st) = (job(), system(), status());
        assert!(check_feasibility(&j, &s, &st, NodeCapacityCheck::Total).is_none());
        assert_eq!(
            check_feasibility(&j, &s, &st, NodeCapacityCheck::Available),
            Some(Infeasibility::TooManyNodes {
                requested: 100,
                limit: 50
            })
        );
    }

    #[test]
    fn single_failing_axis_is_enough() {
        // Nodes fit, only the GPU check fails.
        let mut j = job();
        j.needs_gpu = true;
        assert_eq!(
            check_feasibility(&j, &system(), &status(), NodeCapacityCheck::Total),
            Some(Infeasibility::GpuUnavailable)
        );
    }

    #[test]
    fn memory_compares_against_total_capacity() {
        let mut s = system();
        s.memory_amount_in_gb = 10.0;
        s.num_nodes = 100;
        let mut st = status();
        st.current_num_available_nodes = 10;
        let mut j = job();
        j.num_nodes = 10;

        j.requested_memory_gb = 1_000.0;
        assert!(feasible(&j, &s, &st), "exactly total capacity fits");

        j.requested_memory_gb = 1_000_000.0;
        assert!(matches!(
            check_feasibility(&j, &s, &st, NodeCapacityCheck::Total),
            Some(Infeasibility::InsufficientMemory { capacity_gb, .. }) if capacity_gb == 1_000.0
        ));
    }

    #[test]
    fn unbounded_storage_accepts_any_request() {
        let mut s = system();
        s.storage_amount_in_gb = None;
        let mut j = job();
        j.requested_storage_gb = 1e15;
        assert!(feasible(&j, &s, &status()));
    }

    #[test]
    fn rejects_storage_over_capacity() {
        let mut s = system();
        s.storage_amount_in_gb = Some(10.0);
        assert!(matches!(
            check_feasibility(&job(), &s, &status(), NodeCapacityCheck::Total),
            Some(Infeasibility::InsufficientStorage { .. })
        ));
    }

    #[test]
    fn rejects_non_positive_walltime() {
        let mut j = job();
        j.walltime = 0.0;
        assert_eq!(
            check_feasibility(&j, &system(), &status(), NodeCapacityCheck::Total),
            Some(Infeasibility::NonPositiveWalltime { walltime: 0.0 })
        );
    }

    #[test]
    fn reason_reads_well() {
        let reason = Infeasibility::TooManyNodes {
            requested: 8,
            limit: 4,
        };
        assert_eq!(reason.to_string(), "requests 8 nodes, limit is 4");
    }
}
