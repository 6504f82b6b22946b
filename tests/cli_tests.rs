//! Integration tests for the rastro command line

mod utils;

use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use utils::*;

fn trace_file(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("trace.jsonl");
    fs::write(&path, to_jsonl(&client_server_trace())).unwrap();
    path
}

#[test]
fn test_text_output_for_one_thread() {
    let dir = tempfile::tempdir().unwrap();
    let trace = trace_file(&dir);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("rastro");
    cmd.arg("--events").arg(&trace).arg("--tid").arg("100");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Critical path of /100 (client): 47 ns in 4 segments"))
        .stdout(predicate::str::contains("PREEMPTED"))
        .stdout(predicate::str::contains("/200 (server)"));
}

#[test]
fn test_json_output_parses() {
    let dir = tempfile::tempdir().unwrap();
    let trace = trace_file(&dir);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("rastro");
    cmd.arg("--events")
        .arg(&trace)
        .arg("--format")
        .arg("json")
        .arg("--worker-name")
        .arg("^cli");

    let output = cmd.output().unwrap();
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["format"], "rastro-json-v1");
    assert_eq!(parsed["build"]["stats"]["events_processed"], 10);

    let paths = parsed["critical_paths"].as_array().unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0]["worker"]["name"], "client");
    assert_eq!(paths[0]["total_duration"], 47);
    assert_eq!(paths[0]["segments"].as_array().unwrap().len(), 4);
    assert!(paths[0].get("breakdown").is_none());
}

#[test]
fn test_summary_table() {
    let dir = tempfile::tempdir().unwrap();
    let trace = trace_file(&dir);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("rastro");
    cmd.arg("--events").arg(&trace).arg("-t").arg("100").arg("-c");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("% time"))
        .stdout(predicate::str::contains("total"));
}

#[test]
fn test_save_then_load() {
    let dir = tempfile::tempdir().unwrap();
    let trace = trace_file(&dir);
    let graph = dir.path().join("trace.graph");

    let mut save = assert_cmd::cargo::cargo_bin_cmd!("rastro");
    save.arg("--events")
        .arg(&trace)
        .arg("--save")
        .arg(&graph)
        .arg("--tid")
        .arg("200");
    save.assert().success();
    assert!(graph.exists());

    let mut load = assert_cmd::cargo::cargo_bin_cmd!("rastro");
    load.arg("--load").arg(&graph).arg("--tid").arg("200");
    load.assert()
        .success()
        .stdout(predicate::str::contains("Critical path of /200 (server): 19 ns"));
}

#[test]
fn test_malformed_lines_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.jsonl");
    let mut content = to_jsonl(&client_server_trace());
    content.push_str("\n{not json}\n");
    fs::write(&path, content).unwrap();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("rastro");
    cmd.arg("--events").arg(&path).arg("--tid").arg("100");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("47 ns"));
}

#[test]
fn test_missing_events_file_fails() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("rastro");
    cmd.arg("--events").arg("/nonexistent/trace.jsonl");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open events file"));
}

#[test]
fn test_invalid_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let trace = trace_file(&dir);
    let config = dir.path().join("rastro.toml");
    fs::write(&config, "[analysis]\ncache_capacity = 0\n").unwrap();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("rastro");
    cmd.arg("--events").arg(&trace).arg("--config").arg(&config);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("cache_capacity"));
}

#[test]
fn test_no_matching_workers() {
    let dir = tempfile::tempdir().unwrap();
    let trace = trace_file(&dir);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("rastro");
    cmd.arg("--events").arg(&trace).arg("--worker-name").arg("nginx");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("No matching workers."));
}
