//! Subprocess bidders.
//!
//! Each bid runs the configured executable once: the request goes in on
//! stdin as a single JSON object and exactly one JSON object is expected
//! back on stdout. The child is killed if it outlives the timeout.

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use swarm_core::wire::{BidRequest, BidResponse};

use crate::error::ExternalError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// An external bidder executable.
#[derive(Debug, Clone)]
pub struct ProcessBidder {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ProcessBidder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Split a command line into program and arguments. `None` if empty.
    pub fn from_command_line<I, S>(parts: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut parts = parts.into_iter().map(Into::into);
        let program = parts.next()?;
        Some(Self::new(program).with_args(parts))
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the bidder once for `request`.
    pub async fn bid(&self, request: &BidRequest) -> Result<BidResponse, ExternalError> {
        let payload = serde_json::to_vec(request)?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExternalError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| {
                ExternalError::Io(std::io::Error::other("bidder stdin was not captured"))
            })?;

        let exchange = async move {
            // A bidder may answer without reading its whole input.
            match stdin.write_all(&payload).await {
                Err(err) if err.kind() != ErrorKind::BrokenPipe => {
                    return Err(ExternalError::Io(err));
                }
                _ => {}
            }
            drop(stdin);
            Ok(child.wait_with_output().await?)
        };

        let output = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    program = %self.program,
                    job = request.job_description.job_id,
                    system = %request.hpc_system_description.name,
                    timeout = ?self.timeout,
                    "bidder timed out"
                );
                return Err(ExternalError::Timeout(self.timeout));
            }
        };

        if !output.status.success() {
            return Err(ExternalError::Exit {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let response = parse_response(&output.stdout)?;
        debug!(
            program = %self.program,
            job = request.job_description.job_id,
            system = %request.hpc_system_description.name,
            bid = response.bid,
            "external bid received"
        );
        Ok(response)
    }

    /// Run one bidder per request concurrently. Results keep request order.
    pub async fn bid_all(
        &self,
        requests: &[BidRequest],
    ) -> Vec<Result<BidResponse, ExternalError>> {
        let handles: Vec<_> = requests
            .iter()
            .map(|request| {
                let bidder = self.clone();
                let request = request.clone();
                tokio::spawn(async move { bidder.bid(&request).await })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(match handle.await {
                Ok(result) => result,
                Err(err) => Err(ExternalError::Aborted(err.to_string())),
            });
        }
        results
    }
}

/// Decode a bidder's stdout.
///
/// The output must be exactly one JSON object. An `"error"` member turns
/// into [`ExternalError::Reported`]; otherwise `bid` and
/// `bid_generation_time_seconds` must both be numbers. The bid value is
/// returned as reported, unclamped.
pub fn parse_response(stdout: &[u8]) -> Result<BidResponse, ExternalError> {
    let value: Value = serde_json::from_slice(stdout)
        .map_err(|err| ExternalError::Malformed(format!("expected one JSON object: {err}")))?;

    let Value::Object(fields) = value else {
        return Err(ExternalError::Malformed("expected a JSON object".to_string()));
    };

    if let Some(error) = fields.get("error") {
        let message = match error {
            Value::String(message) => message.clone(),
            other => other.to_string(),
        };
        return Err(ExternalError::Reported(message));
    }

    let number = |key: &str| -> Result<f64, ExternalError> {
        fields
            .get(key)
            .and_then(Value::as_f64)
            .ok_or_else(|| ExternalError::Malformed(format!("`{key}` must be a number")))
    };

    Ok(BidResponse {
        bid: number("bid")?,
        bid_generation_time_seconds: number("bid_generation_time_seconds")?,
        reasoning: fields.get("reasoning").and_then(Value::as_str).map(str::to_string),
    })
}
