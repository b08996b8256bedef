//! JSON records for out-of-process bidding.
//!
//! A bidder process reads exactly one request object on stdin and writes
//! exactly one response object on stdout:
//!
//! ```text
//! stdin : {"job_description": {...}, "hpc_system_description": {...},
//!          "hpc_system_status": {...}, "current_simulated_time": 0.0}
//! stdout: {"bid": 0.42, "bid_generation_time_seconds": 0.000013}
//!    or : {"error": "<message>"}
//! ```
//!
//! Requests are decoded by hand (not derived) so that every record goes
//! through the legacy-field check and range validation in [`crate::types`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BidError, BidResult};
use crate::types::{Bid, BidContext, JobDescription, SystemDescription, SystemStatus};

/// Request for a single (job, system) bid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BidRequest {
    pub job_description: JobDescription,
    pub hpc_system_description: SystemDescription,
    pub hpc_system_status: SystemStatus,
    pub current_simulated_time: f64,
}

impl BidRequest {
    pub fn from_json(input: &str) -> BidResult<Self> {
        let value: Value = serde_json::from_str(input)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> BidResult<Self> {
        let mut fields = into_object(value)?;
        let job = JobDescription::from_value(required_job(&mut fields)?)?;
        let system =
            SystemDescription::from_value(required_system(&mut fields, "hpc_system_description")?)?;
        let status =
            SystemStatus::from_value(required_system(&mut fields, "hpc_system_status")?)?;
        status.validate_against(&system)?;
        let now = simulated_time(&mut fields)?;

        Ok(Self {
            job_description: job,
            hpc_system_description: system,
            hpc_system_status: status,
            current_simulated_time: now,
        })
    }

    pub fn context(&self) -> BidResult<BidContext<'_>> {
        BidContext::new(
            &self.job_description,
            &self.hpc_system_description,
            &self.hpc_system_status,
            self.current_simulated_time,
        )
    }
}

/// Successful bidder output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidResponse {
    pub bid: f64,
    pub bid_generation_time_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl From<&Bid> for BidResponse {
    fn from(bid: &Bid) -> Self {
        Self {
            bid: bid.value,
            bid_generation_time_seconds: round_seconds(bid.decision_time_seconds),
            reasoning: bid.reasoning.clone(),
        }
    }
}

/// Failure output. Callers treat it as a 0.0 bid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl ToString) -> Self {
        Self {
            error: error.to_string(),
        }
    }
}

/// One system offered to the central selector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateRecord {
    pub system_name: String,
    pub description: SystemDescription,
    pub status: SystemStatus,
}

/// Request to pick the best system for a job among many.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionRequest {
    pub job_description: JobDescription,
    pub systems: Vec<CandidateRecord>,
    pub current_simulated_time: f64,
}

impl SelectionRequest {
    pub fn from_json(input: &str) -> BidResult<Self> {
        let value: Value = serde_json::from_str(input)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> BidResult<Self> {
        let mut fields = into_object(value)?;
        let job = JobDescription::from_value(required_job(&mut fields)?)?;
        let systems = match fields.remove("systems") {
            Some(Value::Array(entries)) => entries
                .into_iter()
                .enumerate()
                .map(|(index, entry)| decode_candidate(index, entry))
                .collect::<BidResult<Vec<_>>>()?,
            Some(other) => {
                return Err(BidError::InvalidSystem(format!(
                    "`systems` must be an array, got {}",
                    type_name(&other)
                )));
            }
            None => return Err(BidError::InvalidSystem("missing `systems`".to_string())),
        };
        let now = simulated_time(&mut fields)?;

        Ok(Self {
            job_description: job,
            systems,
            current_simulated_time: now,
        })
    }
}

/// Output of the central selector. `selected_system` is `null` when no
/// system can run the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResponse {
    pub selected_system: Option<String>,
    pub decision_time_seconds: f64,
}

/// Selector failure output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionErrorResponse {
    pub error: String,
    pub selected_system: Option<String>,
}

impl SelectionErrorResponse {
    pub fn new(error: impl ToString) -> Self {
        Self {
            error: error.to_string(),
            selected_system: None,
        }
    }
}

/// Timings are reported with microsecond resolution.
pub fn round_seconds(seconds: f64) -> f64 {
    (seconds * 1e6).round() / 1e6
}

fn decode_candidate(index: usize, entry: Value) -> BidResult<CandidateRecord> {
    let mut fields = match entry {
        Value::Object(fields) => fields,
        other => {
            return Err(BidError::InvalidSystem(format!(
                "systems[{index}] must be an object, got {}",
                type_name(&other)
            )));
        }
    };
    let system_name = match fields.remove("system_name") {
        Some(Value::String(name)) if !name.is_empty() => name,
        _ => {
            return Err(BidError::InvalidSystem(format!(
                "systems[{index}] is missing a non-empty `system_name`"
            )));
        }
    };
    // Range checks run when the candidate is scored, so an out-of-range
    // system bids 0.0 instead of failing the whole auction.
    let description = SystemDescription::decode(required_system(&mut fields, "description")?)?;
    let status = SystemStatus::from_value(required_system(&mut fields, "status")?)?;

    Ok(CandidateRecord {
        system_name,
        description,
        status,
    })
}

fn into_object(value: Value) -> BidResult<Map<String, Value>> {
    match value {
        Value::Object(fields) => Ok(fields),
        other => Err(BidError::Transport(format!(
            "request must be a JSON object, got {}",
            type_name(&other)
        ))),
    }
}

fn required_job(fields: &mut Map<String, Value>) -> BidResult<Value> {
    fields
        .remove("job_description")
        .ok_or_else(|| BidError::InvalidJob("missing `job_description`".to_string()))
}

fn required_system(fields: &mut Map<String, Value>, key: &str) -> BidResult<Value> {
    fields
        .remove(key)
        .ok_or_else(|| BidError::InvalidSystem(format!("missing `{key}`")))
}

fn simulated_time(fields: &mut Map<String, Value>) -> BidResult<f64> {
    match fields.remove("current_simulated_time") {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| {
            BidError::Transport(format!("unrepresentable current_simulated_time {n}"))
        }),
        Some(other) => Err(BidError::Transport(format!(
            "current_simulated_time must be a number, got {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
