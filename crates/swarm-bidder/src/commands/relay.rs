use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::warn;

use swarm_core::BidderConfig;
use swarm_core::wire::{BidRequest, BidResponse, ErrorResponse};
use swarm_external::{FallbackBidder, ProcessBidder};

use super::Reply;
use super::bid::BidReply;

pub async fn respond(
    input: String,
    config: &BidderConfig,
    bidder: &[String],
    timeout: Duration,
) -> BidReply {
    match relay(&input, config, bidder, timeout).await {
        Ok(response) => Reply::Ok(response),
        Err(err) => {
            warn!(error = %err, "relay failed");
            Reply::Err(ErrorResponse::new(format!("{err:#}")))
        }
    }
}

async fn relay(
    input: &str,
    config: &BidderConfig,
    bidder: &[String],
    timeout: Duration,
) -> anyhow::Result<BidResponse> {
    let request = BidRequest::from_json(input)?;
    let ctx = request.context()?;
    let fallback = FallbackBidder::from_config(config)?;

    if let Some(bid) = fallback.gate(&ctx) {
        return Ok(BidResponse::from(&bid));
    }

    let process = ProcessBidder::from_command_line(bidder.iter().cloned())
        .context("relay needs an external bidder command")?
        .with_timeout(timeout);
    let start = Instant::now();
    let outcome = process.bid(&request).await;
    let bid = fallback.resolve_response(&ctx, outcome, start.elapsed())?;
    Ok(BidResponse::from(&bid))
}
