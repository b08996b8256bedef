//! Central auction clearing.
//!
//! Scores every candidate system for a job and returns the arg-max. A best
//! bid of 0.0 (or nothing at all) means no system can take the job. Ties go
//! to the candidate seen first. Candidates whose bid errored or never
//! arrived count as 0.0.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{debug, warn};

use swarm_core::wire::CandidateRecord;
use swarm_core::{
    BidContext, BidResult, JobDescription, SystemDescription, SystemStatus, sanitize_bid,
};

use crate::engine::BidScorer;

/// A system offered to the selector.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub system_name: &'a str,
    pub description: &'a SystemDescription,
    pub status: &'a SystemStatus,
}

impl<'a> From<&'a CandidateRecord> for Candidate<'a> {
    fn from(record: &'a CandidateRecord) -> Self {
        Self {
            system_name: &record.system_name,
            description: &record.description,
            status: &record.status,
        }
    }
}

/// Bid computed for one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateBid {
    pub system_name: String,
    pub bid: BidResult<f64>,
}

impl CandidateBid {
    /// Bid value, with errors counted as 0.0.
    pub fn value(&self) -> f64 {
        match self.bid {
            Ok(value) => sanitize_bid(value),
            Err(_) => 0.0,
        }
    }
}

fn score_candidate<S>(
    job: &JobDescription,
    candidate: &Candidate<'_>,
    now: f64,
    scorer: &S,
) -> CandidateBid
where
    S: BidScorer + ?Sized,
{
    let bid = BidContext::new(job, candidate.description, candidate.status, now)
        .and_then(|ctx| scorer.score(&ctx));
    if let Err(err) = &bid {
        warn!(
            job = job.job_id,
            system = candidate.system_name,
            error = %err,
            "candidate bid failed, counting it as 0.0"
        );
    }
    CandidateBid {
        system_name: candidate.system_name.to_string(),
        bid,
    }
}

/// Score every candidate, preserving candidate order.
pub fn rank<S>(
    job: &JobDescription,
    candidates: &[Candidate<'_>],
    now: f64,
    scorer: &S,
) -> Vec<CandidateBid>
where
    S: BidScorer + ?Sized,
{
    #[cfg(feature = "parallel")]
    let bids = candidates
        .par_iter()
        .map(|c| score_candidate(job, c, now, scorer))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let bids = candidates
        .iter()
        .map(|c| score_candidate(job, c, now, scorer))
        .collect();

    bids
}

/// Pick the winning system, or `None` if no candidate bids above 0.0.
pub fn select<S>(
    job: &JobDescription,
    candidates: &[Candidate<'_>],
    now: f64,
    scorer: &S,
) -> Option<String>
where
    S: BidScorer + ?Sized,
{
    let ranked = rank(job, candidates, now, scorer);
    let winner = select_from_bids(
        ranked
            .iter()
            .map(|c| (c.system_name.as_str(), c.bid.as_ref().ok().copied())),
    )
    .map(str::to_string);

    debug!(
        job = job.job_id,
        candidates = candidates.len(),
        winner = winner.as_deref().unwrap_or("<none>"),
        "cleared auction"
    );
    winner
}

/// Clear an auction over bids that were already collected.
///
/// `None` stands for an absent or failed bid and counts as 0.0. Only a
/// strictly greater bid displaces the current leader.
pub fn select_from_bids<'a, I>(bids: I) -> Option<&'a str>
where
    I: IntoIterator<Item = (&'a str, Option<f64>)>,
{
    let mut best: Option<(&'a str, f64)> = None;
    for (name, bid) in bids {
        let value = bid.map(sanitize_bid).unwrap_or(0.0);
        match best {
            Some((_, leader)) if value <= leader => {}
            _ => best = Some((name, value)),
        }
    }

    match best {
        Some((name, value)) if value > 0.0 => Some(name),
        _ => None,
    }
}
