use tracing::warn;

use swarm_bidding::BidEngine;
use swarm_core::wire::{BidRequest, BidResponse, ErrorResponse};
use swarm_core::{BidResult, BidderConfig};

use super::Reply;

pub type BidReply = Reply<BidResponse, ErrorResponse>;

pub fn respond(input: String, config: &BidderConfig, explain: bool) -> BidReply {
    let engine = BidEngine::from_config(config);
    match compute(&input, &engine) {
        Ok(mut response) => {
            if !explain {
                response.reasoning = None;
            }
            Reply::Ok(response)
        }
        Err(err) => {
            warn!(error = %err, scorer = engine.scorer().name(), "bid request failed");
            Reply::Err(ErrorResponse::new(err))
        }
    }
}

fn compute(input: &str, engine: &BidEngine) -> BidResult<BidResponse> {
    let request = BidRequest::from_json(input)?;
    let bid = engine.bid(&request)?;
    Ok(BidResponse::from(&bid))
}
