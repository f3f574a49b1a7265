//! CLI integration tests for `notary check`, `notary inspect` and
//! `notary keygen`.
//!
//! Uses `assert_cmd` to spawn the `notary` binary and verify exit codes
//! and the JSON printed on stdout.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn notary() -> Command {
    cargo_bin_cmd!("notary")
}

/// A transaction id made of one repeated hex byte, e.g. `tx_id("11")`.
fn tx_id(byte: &str) -> String {
    format!("SHA-256:{}", byte.repeat(32))
}

fn request(tx: &str, inputs: &[String], outputs: i32) -> Value {
    json!({
        "tx_id": tx_id(tx),
        "holding_identity": { "x500_name": "O=Alice, L=London, C=GB", "group_id": "group-1" },
        "input_states": inputs,
        "reference_states": [],
        "num_output_states": outputs,
        "time_window_upper_bound": "2999-01-01T00:00:00Z"
    })
}

fn write_requests(tmp: &TempDir, requests: &[Value]) -> PathBuf {
    let path = tmp.path().join("requests.jsonl");
    let lines: Vec<String> = requests.iter().map(Value::to_string).collect();
    fs::write(&path, lines.join("\n") + "\n").unwrap();
    path
}

fn write_config(tmp: &TempDir, body: &str) -> PathBuf {
    let path = tmp.path().join("notary.toml");
    fs::write(&path, body).unwrap();
    path
}

fn journal_config(tmp: &TempDir) -> PathBuf {
    let journal = tmp.path().join("journal");
    write_config(
        tmp,
        &format!(
            "[store]\nkind = \"journal\"\njournal_path = {:?}\nsync = false\n",
            journal.to_str().unwrap()
        ),
    )
}

fn stdout_json_lines(output: &[u8]) -> Vec<Value> {
    String::from_utf8(output.to_vec())
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

/// Issue two states, spend one, then try to spend it again.
fn double_spend_requests() -> Vec<Value> {
    let spent = format!("{}:0", tx_id("11"));
    vec![
        request("11", &[], 2),
        request("22", &[spent.clone()], 1),
        request("33", &[spent], 0),
    ]
}

// ── Help ────────────────────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    notary()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Notary uniqueness checker"));
}

// ── Check ───────────────────────────────────────────────────────────

#[test]
fn check_prints_one_response_per_request() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(&tmp, "");
    let requests = write_requests(&tmp, &double_spend_requests());

    let output = notary()
        .args(["check", "--config"])
        .arg(&config)
        .arg("--requests")
        .arg(&requests)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let responses = stdout_json_lines(&output.stdout);
    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0]["result"]["status"], "success");
    assert_eq!(responses[0]["signature"]["algorithm"], "ed25519");
    assert_eq!(responses[1]["result"]["status"], "success");

    let failure = &responses[2];
    assert_eq!(failure["result"]["status"], "failure");
    assert_eq!(failure["result"]["error"]["kind"], "input_state_conflict");
    assert_eq!(
        failure["result"]["error"]["conflicting_states"][0]["consuming_tx_id"],
        tx_id("22")
    );
    assert!(failure["signature"].is_null());
}

#[test]
fn check_signs_with_given_key() {
    let tmp = TempDir::new().unwrap();
    let prefix = tmp.path().join("notary");
    notary()
        .args(["keygen", "--prefix", prefix.to_str().unwrap()])
        .assert()
        .success();
    let public_key = fs::read_to_string(tmp.path().join("notary.pub")).unwrap();

    let config = write_config(&tmp, "");
    let requests = write_requests(&tmp, &[request("11", &[], 1)]);
    let output = notary()
        .args(["check", "--config"])
        .arg(&config)
        .arg("--requests")
        .arg(&requests)
        .arg("--key")
        .arg(tmp.path().join("notary.secret"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let responses = stdout_json_lines(&output.stdout);
    assert_eq!(responses[0]["signature"]["public_key"], public_key.trim());
}

#[test]
fn check_reports_malformed_requests_as_results() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(&tmp, "");
    let requests = write_requests(&tmp, &[request("11", &[], -1)]);

    let output = notary()
        .args(["check", "--config"])
        .arg(&config)
        .arg("--requests")
        .arg(&requests)
        .output()
        .unwrap();
    assert!(output.status.success());

    let responses = stdout_json_lines(&output.stdout);
    assert_eq!(responses[0]["result"]["error"]["kind"], "malformed_request");
}

#[test]
fn check_rejects_unreadable_request_line() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(&tmp, "");
    let requests = tmp.path().join("requests.jsonl");
    fs::write(&requests, "{\"tx_id\": 42}\n").unwrap();

    notary()
        .args(["check", "--config"])
        .arg(&config)
        .arg("--requests")
        .arg(&requests)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("requests.jsonl:1"));
}

#[test]
fn check_rejects_invalid_config() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(&tmp, "[store]\nkind = \"journal\"\n");
    let requests = write_requests(&tmp, &[request("11", &[], 1)]);

    notary()
        .args(["check", "--config"])
        .arg(&config)
        .arg("--requests")
        .arg(&requests)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("journal_path"));
}

// ── Journal + inspect ───────────────────────────────────────────────

#[test]
fn journal_keeps_decisions_across_runs() {
    let tmp = TempDir::new().unwrap();
    let config = journal_config(&tmp);

    let requests = write_requests(&tmp, &double_spend_requests()[..2]);
    notary()
        .args(["check", "--config"])
        .arg(&config)
        .arg("--requests")
        .arg(&requests)
        .assert()
        .success();

    // A second run sees the first run's consumption.
    let requests = write_requests(&tmp, &double_spend_requests()[2..]);
    let output = notary()
        .args(["check", "--config"])
        .arg(&config)
        .arg("--requests")
        .arg(&requests)
        .output()
        .unwrap();
    assert!(output.status.success());
    let responses = stdout_json_lines(&output.stdout);
    assert_eq!(responses[0]["result"]["error"]["kind"], "input_state_conflict");

    let rejected = tx_id("33");
    let spent = format!("{}:0", tx_id("11"));
    let unspent = format!("{}:1", tx_id("11"));
    let unknown = format!("{}:0", tx_id("99"));
    let output = notary()
        .args(["inspect", "--config"])
        .arg(&config)
        .args([
            "--holding-identity",
            "O=Alice, L=London, C=GB",
            "--group",
            "group-1",
            "--transaction",
            rejected.as_str(),
            spent.as_str(),
            unspent.as_str(),
            unknown.as_str(),
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let lines = stdout_json_lines(&output.stdout);
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0]["status"], "consumed");
    assert_eq!(lines[0]["consuming_tx_id"], tx_id("22"));
    assert_eq!(lines[1]["status"], "unconsumed");
    assert_eq!(lines[2]["status"], "unknown");
    assert_eq!(lines[3]["result"]["status"], "failure");
}

#[test]
fn inspect_rejects_bad_state_ref() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(&tmp, "");

    notary()
        .args(["inspect", "--config"])
        .arg(&config)
        .args(["--holding-identity", "O=Alice", "--group", "g", "not-a-ref"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid state ref"));
}

// ── Keygen ──────────────────────────────────────────────────────────

#[test]
fn keygen_writes_secret_and_public_key() {
    let tmp = TempDir::new().unwrap();
    let prefix = tmp.path().join("signer");

    notary()
        .args(["keygen", "--prefix", prefix.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Generated Ed25519 keypair"));

    assert!(tmp.path().join("signer.secret").exists());
    assert!(tmp.path().join("signer.pub").exists());
}

#[test]
fn keygen_rejects_unknown_algorithm() {
    let tmp = TempDir::new().unwrap();
    let prefix = tmp.path().join("signer");

    notary()
        .args(["keygen", "--prefix", prefix.to_str().unwrap(), "--algorithm", "rsa"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("unsupported algorithm"));
}
