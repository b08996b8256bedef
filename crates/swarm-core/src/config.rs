//! swarm.toml configuration parser.
//!
//! Every section and field is optional; omitted values fall back to the
//! reference tuning below.

use std::path::Path;

use anyhow::{bail, ensure};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BidderConfig {
    pub scorer: ScorerKind,
    pub feasibility: FeasibilityConfig,
    pub heuristic: HeuristicWeights,
    pub embedding: EmbeddingConfig,
    pub external: ExternalConfig,
}

/// Which scoring model computes bids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScorerKind {
    #[default]
    Heuristic,
    Embedding,
}

impl ScorerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScorerKind::Heuristic => "heuristic",
            ScorerKind::Embedding => "embedding",
        }
    }
}

/// What the node-count feasibility check compares against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeCapacityCheck {
    /// Total system nodes. A job that fits the machine may wait in its queue.
    #[default]
    Total,
    /// Nodes free right now.
    Available,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeasibilityConfig {
    pub node_check: NodeCapacityCheck,
}

/// Factor levels for the heuristic scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicWeights {
    /// Job type equals system type.
    pub exact_type: f64,
    /// HPC, AI and HYBRID across each other.
    pub compatible_type: f64,
    /// STORAGE job on a compute system, or the reverse.
    pub storage_mismatch: f64,
    pub default_type: f64,

    /// Locality term. When disabled the factor is a neutral 1.0.
    pub site_affinity: bool,
    pub same_system: f64,
    pub same_site: f64,
    pub cross_site: f64,

    /// Penalty per queued job.
    pub queue_step: f64,
    pub queue_floor: f64,

    /// Decay rate α in `exp(-α · wait)`.
    pub delay_decay: f64,
    pub delay_floor: f64,

    /// Decimal places kept in the final bid.
    pub precision: u32,
}

impl Default for HeuristicWeights {
    fn default() -> Self {
        Self {
            exact_type: 1.0,
            compatible_type: 0.8,
            storage_mismatch: 0.3,
            default_type: 0.5,
            site_affinity: true,
            same_system: 1.0,
            same_site: 0.9,
            cross_site: 0.7,
            queue_step: 0.1,
            queue_floor: 0.1,
            delay_decay: 0.05,
            delay_floor: 0.1,
            precision: 2,
        }
    }
}

/// Saturation caps for job-side embedding features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobCaps {
    pub nodes: f64,
    /// Minutes (one week).
    pub walltime: f64,
    pub memory_gb: f64,
    pub storage_gb: f64,
}

impl Default for JobCaps {
    fn default() -> Self {
        Self {
            nodes: 2048.0,
            walltime: 10_080.0,
            memory_gb: 1e6,
            storage_gb: 500.0,
        }
    }
}

/// Saturation caps for system-side embedding features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemCaps {
    /// Largest known machine (Aurora).
    pub nodes: f64,
    /// FLOPS.
    pub node_speed: f64,
    pub memory_gb: f64,
    pub storage_gb: f64,
}

impl Default for SystemCaps {
    fn default() -> Self {
        Self {
            nodes: 10_624.0,
            node_speed: 312e12,
            memory_gb: 9472.0 * 12_000.0,
            storage_gb: 700e6,
        }
    }
}

/// Parameters of the embedding similarity scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub job_caps: JobCaps,
    pub system_caps: SystemCaps,
    /// Stand-in capacity for systems with unbounded storage.
    pub unbounded_storage_gb: f64,

    pub numeric_weight: f64,
    pub type_weight: f64,
    pub site_weight: f64,

    /// Speed (FLOPS) at which predicted runtime equals walltime.
    pub baseline_speed: f64,

    pub static_weight: f64,
    pub dynamic_weight: f64,
    pub headroom_weight: f64,
    pub slowdown_weight: f64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            job_caps: JobCaps::default(),
            system_caps: SystemCaps::default(),
            unbounded_storage_gb: 1e9,
            numeric_weight: 1.0,
            type_weight: 0.7,
            site_weight: 0.5,
            baseline_speed: 4.9e12,
            static_weight: 0.6,
            dynamic_weight: 0.4,
            headroom_weight: 0.5,
            slowdown_weight: 0.5,
        }
    }
}

/// Out-of-process bidders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalConfig {
    pub timeout_secs: u64,
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl BidderConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), scorer = config.scorer.as_str(), "loaded bidder config");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: BidderConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject tunings that would produce NaN or out-of-range bids.
    pub fn validate(&self) -> anyhow::Result<()> {
        let h = &self.heuristic;
        for (name, level) in [
            ("heuristic.exact_type", h.exact_type),
            ("heuristic.compatible_type", h.compatible_type),
            ("heuristic.storage_mismatch", h.storage_mismatch),
            ("heuristic.default_type", h.default_type),
            ("heuristic.same_system", h.same_system),
            ("heuristic.same_site", h.same_site),
            ("heuristic.cross_site", h.cross_site),
            ("heuristic.queue_step", h.queue_step),
            ("heuristic.queue_floor", h.queue_floor),
            ("heuristic.delay_floor", h.delay_floor),
        ] {
            ensure!(
                level.is_finite() && (0.0..=1.0).contains(&level),
                "{name} must be within [0, 1], got {level}"
            );
        }
        ensure!(
            h.delay_decay.is_finite() && h.delay_decay >= 0.0,
            "heuristic.delay_decay must be non-negative, got {}",
            h.delay_decay
        );
        ensure!(h.precision <= 12, "heuristic.precision must be at most 12, got {}", h.precision);

        let e = &self.embedding;
        for (name, cap) in [
            ("embedding.job_caps.nodes", e.job_caps.nodes),
            ("embedding.job_caps.walltime", e.job_caps.walltime),
            ("embedding.job_caps.memory_gb", e.job_caps.memory_gb),
            ("embedding.job_caps.storage_gb", e.job_caps.storage_gb),
            ("embedding.system_caps.nodes", e.system_caps.nodes),
            ("embedding.system_caps.node_speed", e.system_caps.node_speed),
            ("embedding.system_caps.memory_gb", e.system_caps.memory_gb),
            ("embedding.system_caps.storage_gb", e.system_caps.storage_gb),
            ("embedding.unbounded_storage_gb", e.unbounded_storage_gb),
            ("embedding.baseline_speed", e.baseline_speed),
        ] {
            ensure!(cap.is_finite() && cap > 0.0, "{name} must be positive, got {cap}");
        }
        for (name, weight) in [
            ("embedding.numeric_weight", e.numeric_weight),
            ("embedding.type_weight", e.type_weight),
            ("embedding.site_weight", e.site_weight),
            ("embedding.static_weight", e.static_weight),
            ("embedding.dynamic_weight", e.dynamic_weight),
            ("embedding.headroom_weight", e.headroom_weight),
            ("embedding.slowdown_weight", e.slowdown_weight),
        ] {
            ensure!(
                weight.is_finite() && weight >= 0.0,
                "{name} must be non-negative, got {weight}"
            );
        }

        if self.external.timeout_secs == 0 {
            bail!("external.timeout_secs must be positive");
        }
        Ok(())
    }
}
