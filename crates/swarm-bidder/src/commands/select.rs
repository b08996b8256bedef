use std::time::{Duration, Instant};

use tracing::{debug, warn};

use swarm_bidding::{BidEngine, Candidate, select, select_from_bids};
use swarm_core::BidderConfig;
use swarm_core::wire::{
    BidRequest, SelectionErrorResponse, SelectionRequest, SelectionResponse, round_seconds,
};
use swarm_external::{FallbackBidder, ProcessBidder};

use super::Reply;

pub type SelectionReply = Reply<SelectionResponse, SelectionErrorResponse>;

/// Clear one auction. An empty `bidder` command line scores candidates
/// with the configured built-in scorer.
pub async fn respond(
    input: String,
    config: &BidderConfig,
    bidder: &[String],
    timeout: Duration,
) -> SelectionReply {
    let start = Instant::now();
    let request = match SelectionRequest::from_json(&input) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "selection request rejected");
            return Reply::Err(SelectionErrorResponse::new(err));
        }
    };

    let selected_system = match ProcessBidder::from_command_line(bidder.iter().cloned()) {
        None => select_locally(&request, config),
        Some(process) => {
            let process = process.with_timeout(timeout);
            match select_externally(&request, config, process).await {
                Ok(selected) => selected,
                Err(err) => {
                    warn!(error = %err, "external selection failed");
                    return Reply::Err(SelectionErrorResponse::new(format!("{err:#}")));
                }
            }
        }
    };

    Reply::Ok(SelectionResponse {
        selected_system,
        decision_time_seconds: round_seconds(start.elapsed().as_secs_f64()),
    })
}

fn select_locally(request: &SelectionRequest, config: &BidderConfig) -> Option<String> {
    let engine = BidEngine::from_config(config);
    let candidates: Vec<Candidate<'_>> = request.systems.iter().map(Candidate::from).collect();
    select(
        &request.job_description,
        &candidates,
        request.current_simulated_time,
        engine.scorer(),
    )
}

async fn select_externally(
    request: &SelectionRequest,
    config: &BidderConfig,
    process: ProcessBidder,
) -> anyhow::Result<Option<String>> {
    let fallback = FallbackBidder::from_config(config)?;

    let per_system: Vec<BidRequest> = request
        .systems
        .iter()
        .map(|candidate| BidRequest {
            job_description: request.job_description.clone(),
            hpc_system_description: candidate.description.clone(),
            hpc_system_status: candidate.status.clone(),
            current_simulated_time: request.current_simulated_time,
        })
        .collect();

    // Infeasible candidates never reach the external bidder.
    let mut bids: Vec<Option<f64>> = vec![None; per_system.len()];
    let mut pending = Vec::new();
    for (index, bid_request) in per_system.iter().enumerate() {
        match bid_request.context() {
            Ok(ctx) => match fallback.gate(&ctx) {
                Some(bid) => bids[index] = Some(bid.value),
                None => pending.push(index),
            },
            Err(err) => warn!(
                system = %bid_request.hpc_system_description.name,
                error = %err,
                "candidate skipped"
            ),
        }
    }

    let outgoing: Vec<BidRequest> = pending
        .iter()
        .map(|&index| per_system[index].clone())
        .collect();
    let fan_out = Instant::now();
    let outcomes = process.bid_all(&outgoing).await;
    let elapsed = fan_out.elapsed();
    for (&index, outcome) in pending.iter().zip(outcomes) {
        let ctx = per_system[index].context()?;
        bids[index] = match fallback.resolve_response(&ctx, outcome, elapsed) {
            Ok(bid) => Some(bid.value),
            Err(err) => {
                warn!(
                    system = %per_system[index].hpc_system_description.name,
                    error = %err,
                    "candidate bid failed"
                );
                None
            }
        };
    }

    debug!(
        job = request.job_description.job_id,
        candidates = bids.len(),
        external = outgoing.len(),
        "collected external bids"
    );
    let winner = select_from_bids(
        request
            .systems
            .iter()
            .zip(&bids)
            .map(|(candidate, bid)| (candidate.system_name.as_str(), *bid)),
    );
    Ok(winner.map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn candidate(name: &str, available: u64, has_gpu: bool) -> Value {
        json!({
            "system_name": name,
            "description": {
                "name": name, "site": "ALCF", "type": "HPC", "num_nodes": 200,
                "memory_amount_in_gb": 512.0, "has_gpu": has_gpu, "node_speed": 4.9e12
            },
            "status": {
                "current_num_available_nodes": available,
                "current_job_start_time_estimate": 0.0
            }
        })
    }

    fn request(systems: Vec<Value>) -> String {
        json!({
            "job_description": {
                "job_id": 9, "user_id": 1, "group_id": 1, "job_type": "HPC",
                "submission_time": 0.0, "walltime": 60.0, "num_nodes": 100,
                "needs_gpu": false, "requested_memory_gb": 1000.0, "requested_storage_gb": 0.0,
                "hpc_site": "NERSC", "hpc_system": "Perlmutter"
            },
            "systems": systems
        })
        .to_string()
    }

    async fn run(input: String, bidder: &[String]) -> Value {
        let config = BidderConfig::default();
        let reply = respond(input, &config, bidder, Duration::from_secs(5)).await;
        serde_json::to_value(reply).unwrap()
    }

    #[tokio::test]
    async fn picks_freest_system() {
        let input = request(vec![
            candidate("polaris", 20, false),
            candidate("aurora", 180, false),
            candidate("theta", 90, false),
        ]);
        let out = run(input, &[]).await;
        assert_eq!(out["selected_system"], json!("aurora"));
        assert!(out["decision_time_seconds"].as_f64().unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn null_when_no_system_has_capacity() {
        let input = request(vec![candidate("full", 0, false)]);
        let out = run(input, &[]).await;
        assert_eq!(out["selected_system"], Value::Null);
        assert!(out.get("error").is_none());
    }

    #[tokio::test]
    async fn out_of_range_candidate_counts_as_zero() {
        let input = request(vec![
            candidate("good", 150, false),
            candidate("bad", 999, false),
        ]);
        let out = run(input, &[]).await;
        assert_eq!(out["selected_system"], json!("good"));
        assert!(out.get("error").is_none());
    }

    #[tokio::test]
    async fn only_out_of_range_candidates_select_nothing() {
        let input = request(vec![candidate("bad", 999, false)]);
        let out = run(input, &[]).await;
        assert_eq!(out["selected_system"], Value::Null);
        assert!(out.get("error").is_none());
    }

    #[tokio::test]
    async fn malformed_request_is_an_error_object() {
        let out = run("[]".to_string(), &[]).await;
        assert!(out["error"].is_string());
        assert_eq!(out["selected_system"], Value::Null);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn external_bidder_decides() {
        let script = r#"if grep -q '"name":"theta"'; then
                          echo '{"bid": 0.8, "bid_generation_time_seconds": 0}'
                        else
                          echo '{"bid": 0.3, "bid_generation_time_seconds": 0}'
                        fi"#;
        let bidder = ["sh".to_string(), "-c".to_string(), script.to_string()];
        let input = request(vec![
            candidate("aurora", 180, false),
            candidate("theta", 90, false),
        ]);
        let out = run(input, &bidder).await;
        assert_eq!(out["selected_system"], json!("theta"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn out_of_range_candidate_never_reaches_external_bidder() {
        let script = r#"cat > /dev/null; echo '{"bid": 0.9, "bid_generation_time_seconds": 0}'"#;
        let bidder = ["sh".to_string(), "-c".to_string(), script.to_string()];
        let input = request(vec![
            candidate("bad", 999, false),
            candidate("good", 150, false),
        ]);
        let out = run(input, &bidder).await;
        assert_eq!(out["selected_system"], json!("good"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn broken_external_bidder_falls_back_to_heuristic() {
        let bidder = ["sh".to_string(), "-c".to_string(), "exit 1".to_string()];
        let input = request(vec![
            candidate("aurora", 180, false),
            candidate("theta", 90, false),
        ]);
        let out = run(input, &bidder).await;
        assert_eq!(out["selected_system"], json!("aurora"));
    }
}
