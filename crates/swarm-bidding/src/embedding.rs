//! Embedding similarity scorer.
//!
//! Jobs and systems are projected into the same 14-dimensional space:
//!
//! ```text
//! [ numeric (5) | type one-hot (4 + OTHER) | site one-hot (3 + OTHER) ]
//! ```
//!
//! Numeric features are log-compressed against a cap,
//! `log1p(min(x, cap)) / log1p(cap)`, plus a GPU flag. Each block is
//! weighted, then the whole vector is L2-normalized, so the dot product of
//! two embeddings is their cosine similarity.
//!
//! The final bid blends that static similarity with a dynamic term built
//! from live headroom and predicted slowdown:
//!
//! ```text
//! static   = max(0, job · system)
//! headroom = available / max(1, requested)         → headroom / (1 + headroom)
//! slowdown = (wait + walltime / perf) / max(1, walltime)  → exp(-slowdown)
//! bid      = static_w · static + dynamic_w · (hw · headroom' + sw · slowdown')
//! ```

use swarm_core::config::{EmbeddingConfig, NodeCapacityCheck};
use swarm_core::{BidContext, BidResult, JobDescription, SystemDescription};

use crate::engine::{Assessment, BidScorer};
use crate::feasibility::check_context;

const TYPE_VOCAB: [&str; 4] = ["HPC", "AI", "HYBRID", "STORAGE"];
const SITE_VOCAB: [&str; 3] = ["NERSC", "ALCF", "OLCF"];

const NUMERIC_DIM: usize = 5;
const TYPE_DIM: usize = TYPE_VOCAB.len() + 1;
const SITE_DIM: usize = SITE_VOCAB.len() + 1;

pub const EMBEDDING_DIM: usize = NUMERIC_DIM + TYPE_DIM + SITE_DIM;

/// Norms below this are treated as zero.
const NORM_EPSILON: f64 = 1e-12;

/// A unit-length feature vector, or the zero vector when normalization
/// is impossible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Embedding([f64; EMBEDDING_DIM]);

impl Embedding {
    /// Normalize raw features. Non-finite components are zeroed first.
    pub fn normalize(mut raw: [f64; EMBEDDING_DIM]) -> Self {
        for x in raw.iter_mut() {
            if !x.is_finite() {
                *x = 0.0;
            }
        }
        let norm = raw.iter().map(|x| x * x).sum::<f64>().sqrt();
        if !norm.is_finite() || norm < NORM_EPSILON {
            return Self([0.0; EMBEDDING_DIM]);
        }
        for x in raw.iter_mut() {
            *x /= norm;
        }
        Self(raw)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn dot(&self, other: &Embedding) -> f64 {
        self.0.iter().zip(other.0.iter()).map(|(a, b)| a * b).sum()
    }

    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|x| *x == 0.0)
    }
}

/// Map `x` into [0, 1] on a log scale saturating at `cap`.
fn log_scaled(x: f64, cap: f64) -> f64 {
    let x = if x.is_nan() { 0.0 } else { x.clamp(0.0, cap) };
    x.ln_1p() / cap.ln_1p()
}

fn flag(set: bool) -> f64 {
    if set { 1.0 } else { 0.0 }
}

/// Weighted one-hot into `out`; the last slot is OTHER.
fn write_one_hot(out: &mut [f64], label: &str, vocab: &[&str], weight: f64) {
    debug_assert_eq!(out.len(), vocab.len() + 1);
    let slot = vocab.iter().position(|v| *v == label).unwrap_or(vocab.len());
    out[slot] = weight;
}

fn assemble(
    numeric: [f64; NUMERIC_DIM],
    kind: &str,
    site: &str,
    config: &EmbeddingConfig,
) -> Embedding {
    let mut raw = [0.0; EMBEDDING_DIM];
    for (dst, x) in raw[..NUMERIC_DIM].iter_mut().zip(numeric) {
        *dst = config.numeric_weight * x;
    }
    write_one_hot(
        &mut raw[NUMERIC_DIM..NUMERIC_DIM + TYPE_DIM],
        kind,
        &TYPE_VOCAB,
        config.type_weight,
    );
    write_one_hot(&mut raw[NUMERIC_DIM + TYPE_DIM..], site, &SITE_VOCAB, config.site_weight);
    Embedding::normalize(raw)
}

/// Embed a job: nodes, walltime, total memory, storage, GPU flag, type, origin site.
pub fn embed_job(job: &JobDescription, config: &EmbeddingConfig) -> Embedding {
    let caps = &config.job_caps;
    let numeric = [
        log_scaled(job.num_nodes as f64, caps.nodes),
        log_scaled(job.walltime, caps.walltime),
        log_scaled(job.requested_memory_gb, caps.memory_gb),
        log_scaled(job.requested_storage_gb, caps.storage_gb),
        flag(job.needs_gpu),
    ];
    assemble(numeric, job.job_type.as_str(), &job.hpc_site, config)
}

/// Embed a system: nodes, node speed, per-node memory, storage, GPU flag, type, site.
pub fn embed_system(system: &SystemDescription, config: &EmbeddingConfig) -> Embedding {
    let caps = &config.system_caps;
    let storage = match system.storage_amount_in_gb {
        Some(gb) if gb.is_finite() => gb,
        _ => config.unbounded_storage_gb,
    };
    let numeric = [
        log_scaled(system.num_nodes as f64, caps.nodes),
        log_scaled(system.node_speed, caps.node_speed),
        log_scaled(system.memory_amount_in_gb, caps.memory_gb),
        log_scaled(storage, caps.storage_gb),
        flag(system.has_gpu),
    ];
    assemble(numeric, system.kind.as_str(), &system.site, config)
}

/// Scorer built from [`EmbeddingConfig`].
#[derive(Debug, Clone, Default)]
pub struct EmbeddingScorer {
    config: EmbeddingConfig,
    node_check: NodeCapacityCheck,
}

impl EmbeddingScorer {
    pub fn new(config: EmbeddingConfig, node_check: NodeCapacityCheck) -> Self {
        Self { config, node_check }
    }

    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    /// Cosine similarity clamped at zero.
    pub fn static_similarity(&self, job: &JobDescription, system: &SystemDescription) -> f64 {
        embed_job(job, &self.config)
            .dot(&embed_system(system, &self.config))
            .max(0.0)
    }

    /// Live term: free-node headroom and predicted slowdown.
    pub fn dynamic_score(&self, ctx: &BidContext<'_>) -> f64 {
        let (job, system, status) = (ctx.job(), ctx.system(), ctx.status());
        let c = &self.config;

        let headroom = status.current_num_available_nodes as f64 / (job.num_nodes as f64).max(1.0);
        let headroom_term = headroom / (1.0 + headroom);

        let perf = (system.node_speed / c.baseline_speed.max(1e-9)).max(1e-3);
        let predicted_exec = job.walltime / perf.max(1e-9);
        let slowdown = (ctx.expected_wait() + predicted_exec) / job.walltime.max(1.0);
        let slowdown_term = (-slowdown).exp();

        c.headroom_weight * headroom_term + c.slowdown_weight * slowdown_term
    }
}

impl BidScorer for EmbeddingScorer {
    fn name(&self) -> &'static str {
        "embedding"
    }

    fn assess(&self, ctx: &BidContext<'_>) -> BidResult<Assessment> {
        // Similarity alone says nothing about capacity.
        if let Some(reason) = check_context(ctx, self.node_check) {
            return Ok(Assessment::Infeasible(reason));
        }

        let similarity = self.static_similarity(ctx.job(), ctx.system());
        let dynamic = self.dynamic_score(ctx);
        let value = self.config.static_weight * similarity + self.config.dynamic_weight * dynamic;
        Ok(Assessment::Scored {
            value,
            detail: format!("similarity={similarity:.3} dynamic={dynamic:.3}"),
        })
    }
}
