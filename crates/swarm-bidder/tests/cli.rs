//! End-to-end tests of the bidder executable over stdin/stdout.

use std::io::Write;
use std::process::{Command, Output, Stdio};

use serde_json::{Value, json};

fn run(args: &[&str], stdin: &str) -> Output {
    run_with_env(args, stdin, &[])
}

fn run_with_env(args: &[&str], stdin: &str, env: &[(&str, &str)]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_swarm-bidder"))
        .args(args)
        .env_remove("SWARM_BIDDER_CONFIG")
        .envs(env.iter().copied())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(stdin.as_bytes()).unwrap();
    child.wait_with_output().unwrap()
}

fn stdout_json(output: &Output) -> Value {
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let text = String::from_utf8(output.stdout.clone()).unwrap();
    assert_eq!(text.lines().count(), 1, "expected exactly one line, got {text:?}");
    serde_json::from_str(&text).unwrap()
}

fn bid_request() -> Value {
    json!({
        "job_description": {
            "job_id": 11, "user_id": 2, "group_id": 3, "job_type": "HPC",
            "submission_time": 10.0, "walltime": 120.0, "num_nodes": 100,
            "needs_gpu": false, "requested_memory_gb": 4000.0, "requested_storage_gb": 0.0,
            "hpc_site": "NERSC", "hpc_system": "Perlmutter"
        },
        "hpc_system_description": {
            "name": "Perlmutter", "site": "NERSC", "type": "HPC", "num_nodes": 200,
            "memory_amount_in_gb": 512.0, "storage_amount_in_gb": null,
            "has_gpu": false, "node_speed": 4.9e12
        },
        "hpc_system_status": {
            "current_num_available_nodes": 50,
            "current_job_start_time_estimate": 10.0,
            "queue_length": 0
        },
        "current_simulated_time": 10.0
    })
}

#[test]
fn bid_writes_one_response_object() {
    let out = stdout_json(&run(&["bid"], &bid_request().to_string()));
    assert_eq!(out["bid"], json!(0.12));
    assert!(out["bid_generation_time_seconds"].is_number());
}

#[test]
fn bid_failure_is_reported_on_stdout_with_success_exit() {
    let out = stdout_json(&run(&["bid"], "not json at all"));
    assert!(out["error"].is_string());
}

#[test]
fn memory_request_beyond_capacity_bids_zero() {
    let mut request = bid_request();
    request["job_description"]["requested_memory_gb"] = json!(1_000_000.0);
    request["hpc_system_description"]["memory_amount_in_gb"] = json!(10.0);
    request["hpc_system_description"]["num_nodes"] = json!(100);
    request["hpc_system_status"]["current_num_available_nodes"] = json!(100);
    let out = stdout_json(&run(&["bid", "--scorer", "embedding"], &request.to_string()));
    assert_eq!(out["bid"], json!(0.0));
}

#[test]
fn config_file_changes_scoring() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("swarm.toml");
    std::fs::write(&path, "[heuristic]\nprecision = 3\n").unwrap();

    let args = ["bid", "--config", path.to_str().unwrap()];
    let out = stdout_json(&run(&args, &bid_request().to_string()));
    assert_eq!(out["bid"], json!(0.125));
}

#[test]
fn config_path_is_read_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("swarm.toml");
    std::fs::write(&path, "[heuristic]\nprecision = 3\n").unwrap();

    let out = stdout_json(&run_with_env(
        &["bid"],
        &bid_request().to_string(),
        &[("SWARM_BIDDER_CONFIG", path.to_str().unwrap())],
    ));
    assert_eq!(out["bid"], json!(0.125));
}

fn failed_output_json(output: &Output) -> Value {
    assert!(!output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn invalid_config_writes_error_object_and_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("swarm.toml");
    std::fs::write(&path, "[heuristic]\nqueue_floor = 4.0\n").unwrap();
    let config = path.to_str().unwrap();

    let out = failed_output_json(&run(&["bid", "--config", config], ""));
    assert!(out["error"].as_str().unwrap().contains("queue_floor"));

    let out = failed_output_json(&run(&["select", "--config", config], ""));
    assert!(out["error"].is_string());
    assert_eq!(out["selected_system"], Value::Null);
}

#[test]
fn missing_config_file_writes_error_object() {
    let out = failed_output_json(&run_with_env(
        &["bid"],
        "",
        &[("SWARM_BIDDER_CONFIG", "/nonexistent/swarm.toml")],
    ));
    assert!(out["error"].as_str().unwrap().contains("/nonexistent/swarm.toml"));
}

#[test]
fn config_prints_parseable_defaults() {
    let output = run(&["config"], "");
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).unwrap();
    assert!(text.contains("scorer = \"heuristic\""));
    assert!(text.contains("[embedding]"));
}

#[test]
fn select_returns_winner_name() {
    let request = json!({
        "job_description": bid_request()["job_description"],
        "systems": [
            {
                "system_name": "busy",
                "description": bid_request()["hpc_system_description"],
                "status": {
                    "current_num_available_nodes": 10,
                    "current_job_start_time_estimate": 10.0
                }
            },
            {
                "system_name": "idle",
                "description": bid_request()["hpc_system_description"],
                "status": {
                    "current_num_available_nodes": 200,
                    "current_job_start_time_estimate": 10.0
                }
            }
        ],
        "current_simulated_time": 10.0
    });
    let out = stdout_json(&run(&["select"], &request.to_string()));
    assert_eq!(out["selected_system"], json!("idle"));
    assert!(out["decision_time_seconds"].is_number());
}

#[test]
fn select_failure_carries_null_selection() {
    let out = stdout_json(&run(&["select"], r#"{"systems": []}"#));
    assert!(out["error"].is_string());
    assert_eq!(out["selected_system"], Value::Null);
}

#[test]
fn logs_stay_off_stdout() {
    let output = run_with_env(&["bid"], &bid_request().to_string(), &[("RUST_LOG", "debug")]);
    let out = stdout_json(&output);
    assert!(out["bid"].is_number());
    assert!(!output.stderr.is_empty());
}

#[cfg(unix)]
#[test]
fn relay_forwards_to_external_bidder() {
    let script = r#"cat > /dev/null; echo '{"bid": 0.66, "bid_generation_time_seconds": 0.01}'"#;
    let out = stdout_json(&run(&["relay", "--", "sh", "-c", script], &bid_request().to_string()));
    assert_eq!(out["bid"], json!(0.66));
}

#[cfg(unix)]
#[test]
fn relay_falls_back_on_timeout() {
    let out = stdout_json(&run(
        &["relay", "--timeout-secs", "1", "--", "sh", "-c", "sleep 10"],
        &bid_request().to_string(),
    ));
    assert_eq!(out["bid"], json!(0.12));
    assert!(out["bid_generation_time_seconds"].as_f64().unwrap() >= 1.0);
}
