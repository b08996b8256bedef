//! Records exchanged between the simulation and the bidding engine.
//!
//! Job and system descriptions are produced upstream (workload generator,
//! simulated topology) and are never mutated here. Memory on a job is a
//! *total* request; memory on a system is *per node*.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BidError, BidResult};

/// Workload/system class.
///
/// The four known classes drive type-compatibility scoring. Any other
/// non-empty label (upstream topologies also use `GPU`, `CPU`, ...) is kept
/// verbatim as `Other` and scores with the default factors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ResourceType {
    Hpc,
    Ai,
    Hybrid,
    Storage,
    Other(String),
}

impl ResourceType {
    pub fn as_str(&self) -> &str {
        match self {
            ResourceType::Hpc => "HPC",
            ResourceType::Ai => "AI",
            ResourceType::Hybrid => "HYBRID",
            ResourceType::Storage => "STORAGE",
            ResourceType::Other(label) => label,
        }
    }

    /// HPC, AI and HYBRID are mutually cross-compatible.
    pub fn is_compute(&self) -> bool {
        matches!(self, ResourceType::Hpc | ResourceType::Ai | ResourceType::Hybrid)
    }
}

impl TryFrom<String> for ResourceType {
    type Error = String;

    fn try_from(label: String) -> Result<Self, Self::Error> {
        Ok(match label.as_str() {
            "HPC" => ResourceType::Hpc,
            "AI" => ResourceType::Ai,
            "HYBRID" => ResourceType::Hybrid,
            "STORAGE" => ResourceType::Storage,
            "" => return Err("resource type label must not be empty".to_string()),
            _ => ResourceType::Other(label),
        })
    }
}

impl From<ResourceType> for String {
    fn from(kind: ResourceType) -> Self {
        match kind {
            ResourceType::Other(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job request as emitted by the workload generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescription {
    pub job_id: u64,
    pub user_id: u64,
    pub group_id: u64,
    pub job_type: ResourceType,
    /// Simulation-clock timestamp.
    pub submission_time: f64,
    /// Requested runtime in minutes.
    pub walltime: f64,
    pub num_nodes: u64,
    pub needs_gpu: bool,
    /// Total over all nodes.
    pub requested_memory_gb: f64,
    pub requested_storage_gb: f64,
    /// Origin site. Only the site-affinity factor may look at it.
    pub hpc_site: String,
    /// Origin system. Only the site-affinity factor may look at it.
    pub hpc_system: String,
}

/// Static capabilities of a compute system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemDescription {
    pub name: String,
    pub site: String,
    #[serde(rename = "type")]
    pub kind: ResourceType,
    pub num_nodes: u64,
    /// Per node.
    pub memory_amount_in_gb: f64,
    /// Total capacity. `None` (absent or `null`) means unbounded.
    #[serde(default)]
    pub storage_amount_in_gb: Option<f64>,
    pub has_gpu: bool,
    /// Per-node speed in FLOPS.
    pub node_speed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_interconnect: Option<String>,
}

impl SystemDescription {
    pub fn total_memory_gb(&self) -> f64 {
        self.memory_amount_in_gb * self.num_nodes as f64
    }

    /// Storage capacity with an unbounded system reported as infinity.
    pub fn storage_capacity_gb(&self) -> f64 {
        self.storage_amount_in_gb.unwrap_or(f64::INFINITY)
    }
}

/// Live status of a system, refreshed once per decision point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub current_num_available_nodes: u64,
    /// Absolute simulation time at which the system predicts it can start the job.
    pub current_job_start_time_estimate: f64,
    #[serde(default)]
    pub queue_length: u64,
}

/// A system's offer for a job.
///
/// `value` is always within [0, 1]; exactly 0.0 means infeasible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Wall-clock cost of computing the bid.
    pub decision_time_seconds: f64,
}

impl Bid {
    pub fn is_feasible(&self) -> bool {
        self.value > 0.0
    }
}

/// Clamp a raw score into [0, 1]. Non-finite values become 0.0.
pub fn sanitize_bid(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

// ── Schema enforcement ────────────────────

const LEGACY_JOB_FIELDS: &[(&str, &str)] = &[
    ("JobID", "job_id"),
    ("UserID", "user_id"),
    ("GroupID", "group_id"),
    ("JobType", "job_type"),
    ("SubmissionTime", "submission_time"),
    ("Walltime", "walltime"),
    ("Nodes", "num_nodes"),
    ("RequestedGPU", "needs_gpu"),
    ("RequestedMemoryGB", "requested_memory_gb"),
    ("RequestedStorageGB", "requested_storage_gb"),
    ("HPCSite", "hpc_site"),
    ("HPCSystem", "hpc_system"),
];

const LEGACY_SYSTEM_FIELDS: &[(&str, &str)] = &[
    ("node_limit", "num_nodes"),
    ("memory_limit", "memory_amount_in_gb"),
    ("storage_limit", "storage_amount_in_gb"),
];

const LEGACY_STATUS_FIELDS: &[(&str, &str)] = &[
    ("available_nodes", "current_num_available_nodes"),
    ("current_num_avaibable_nodes", "current_num_available_nodes"),
];

/// Find the first legacy key present in a JSON object.
fn find_legacy_field(
    value: &Value,
    legacy: &[(&'static str, &'static str)],
) -> Option<(&'static str, &'static str)> {
    let object = value.as_object()?;
    legacy.iter().copied().find(|(old, _)| object.contains_key(*old))
}

fn check_finite(field: &str, value: f64) -> Result<(), String> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(format!("{field} must be finite, got {value}"))
    }
}

fn check_non_negative(field: &str, value: f64) -> Result<(), String> {
    check_finite(field, value)?;
    if value < 0.0 {
        return Err(format!("{field} must be non-negative, got {value}"));
    }
    Ok(())
}

impl JobDescription {
    /// Decode and validate a job from untyped JSON.
    ///
    /// Payloads using the deprecated CamelCase field names are rejected
    /// rather than mixed with the snake_case schema.
    pub fn from_value(value: Value) -> BidResult<Self> {
        if let Some((old, new)) = find_legacy_field(&value, LEGACY_JOB_FIELDS) {
            return Err(BidError::InvalidJob(format!(
                "legacy field `{old}` is not supported, use `{new}`"
            )));
        }
        let job: JobDescription =
            serde_json::from_value(value).map_err(|e| BidError::InvalidJob(e.to_string()))?;
        job.validate()?;
        Ok(job)
    }

    /// Check field ranges. A non-positive walltime is valid input; it makes
    /// the job infeasible everywhere rather than malformed.
    pub fn validate(&self) -> BidResult<()> {
        let checks = || -> Result<(), String> {
            if self.num_nodes == 0 {
                return Err("num_nodes must be positive".to_string());
            }
            check_finite("submission_time", self.submission_time)?;
            check_finite("walltime", self.walltime)?;
            check_non_negative("requested_memory_gb", self.requested_memory_gb)?;
            check_non_negative("requested_storage_gb", self.requested_storage_gb)?;
            Ok(())
        };
        checks().map_err(|msg| BidError::InvalidJob(format!("job {}: {msg}", self.job_id)))
    }
}

impl SystemDescription {
    /// Decode and validate a system description from untyped JSON.
    pub fn from_value(value: Value) -> BidResult<Self> {
        let system = Self::decode(value)?;
        system.validate()?;
        Ok(system)
    }

    /// Schema-only decode: legacy keys and field types, no range checks.
    pub fn decode(value: Value) -> BidResult<Self> {
        if let Some((old, new)) = find_legacy_field(&value, LEGACY_SYSTEM_FIELDS) {
            return Err(BidError::InvalidSystem(format!(
                "legacy field `{old}` is not supported, use `{new}`"
            )));
        }
        serde_json::from_value(value).map_err(|e| BidError::InvalidSystem(e.to_string()))
    }

    pub fn validate(&self) -> BidResult<()> {
        let checks = || -> Result<(), String> {
            if self.name.is_empty() {
                return Err("name must not be empty".to_string());
            }
            if self.num_nodes == 0 {
                return Err("num_nodes must be positive".to_string());
            }
            check_non_negative("memory_amount_in_gb", self.memory_amount_in_gb)?;
            if let Some(storage) = self.storage_amount_in_gb {
                // +inf is an explicit "unbounded".
                if storage.is_nan() || storage < 0.0 {
                    return Err(format!("storage_amount_in_gb must be non-negative, got {storage}"));
                }
            }
            check_finite("node_speed", self.node_speed)?;
            if self.node_speed <= 0.0 {
                return Err(format!("node_speed must be positive, got {}", self.node_speed));
            }
            Ok(())
        };
        checks().map_err(|msg| BidError::InvalidSystem(format!("system {:?}: {msg}", self.name)))
    }
}

impl SystemStatus {
    /// Decode a status record from untyped JSON. Range checks need the
    /// matching description, see [`SystemStatus::validate_against`].
    pub fn from_value(value: Value) -> BidResult<Self> {
        if let Some((old, new)) = find_legacy_field(&value, LEGACY_STATUS_FIELDS) {
            return Err(BidError::InvalidSystem(format!(
                "legacy field `{old}` is not supported, use `{new}`"
            )));
        }
        serde_json::from_value(value).map_err(|e| BidError::InvalidSystem(e.to_string()))
    }

    pub fn validate_against(&self, system: &SystemDescription) -> BidResult<()> {
        if !self.current_job_start_time_estimate.is_finite() {
            return Err(BidError::InvalidSystem(format!(
                "system {:?}: current_job_start_time_estimate must be finite",
                system.name
            )));
        }
        if self.current_num_available_nodes > system.num_nodes {
            return Err(BidError::InvalidSystem(format!(
                "system {:?}: {} available nodes exceed capacity of {}",
                system.name, self.current_num_available_nodes, system.num_nodes
            )));
        }
        Ok(())
    }

    /// Nodes currently busy.
    pub fn used_nodes(&self, system: &SystemDescription) -> u64 {
        system.num_nodes.saturating_sub(self.current_num_available_nodes)
    }
}

/// A validated (job, system, status, clock) tuple.
///
/// Scorers only accept this type, so every scoring path sees records that
/// passed schema validation.
#[derive(Debug, Clone, Copy)]
pub struct BidContext<'a> {
    job: &'a JobDescription,
    system: &'a SystemDescription,
    status: &'a SystemStatus,
    now: f64,
}

impl<'a> BidContext<'a> {
    pub fn new(
        job: &'a JobDescription,
        system: &'a SystemDescription,
        status: &'a SystemStatus,
        now: f64,
    ) -> BidResult<Self> {
        job.validate()?;
        system.validate()?;
        status.validate_against(system)?;
        if !now.is_finite() {
            return Err(BidError::Transport(format!(
                "current_simulated_time must be finite, got {now}"
            )));
        }
        Ok(Self {
            job,
            system,
            status,
            now,
        })
    }

    pub fn job(&self) -> &'a JobDescription {
        self.job
    }

    pub fn system(&self) -> &'a SystemDescription {
        self.system
    }

    pub fn status(&self) -> &'a SystemStatus {
        self.status
    }

    /// Current simulation time.
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Time until the system expects to start the job, never negative.
    pub fn expected_wait(&self) -> f64 {
        (self.status.current_job_start_time_estimate - self.now).max(0.0)
    }
}
