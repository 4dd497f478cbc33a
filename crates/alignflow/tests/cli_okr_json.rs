//! Tests for the okr commands against a temporary home directory

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn alignflow_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_alignflow"))
}

const ORG: &str = r#"
departments = ["Crypto", "R&D"]

[[users]]
id = "e1"
name = "Erin"
role = "RD_EMPLOYEE"
department = "Crypto"

[[users]]
id = "h1"
name = "Hale"
role = "TECH_HEAD"
department = "Crypto"

[[users]]
id = "gm"
name = "Gita"
role = "TECH_GM"
department = "R&D"
"#;

const CONTENT: &str = r#"{
  "title": "Crypto H1",
  "objectives": [
    {
      "id": "6f1c1a52-8b8e-4c1e-9a57-0d6f3a1e2b10",
      "content": "Ship the signer",
      "weight": 100,
      "key_results": [
        {
          "id": "0b7d4a9e-3c2f-4e51-8f6a-9c1d2e3f4a5b",
          "content": "Signer in production",
          "weight": 100
        }
      ]
    }
  ]
}"#;

fn setup() -> TempDir {
    let home = TempDir::new().unwrap();
    std::fs::write(home.path().join("org.toml"), ORG).unwrap();
    std::fs::write(home.path().join("content.json"), CONTENT).unwrap();
    home
}

fn run(home: &Path, args: &[&str]) -> Output {
    Command::new(alignflow_bin())
        .env("ALIGNFLOW_HOME", home)
        .env_remove("ALIGNFLOW_USER")
        .env_remove("ALIGNFLOW_CONFIG")
        .env_remove("ALIGNFLOW_ORG")
        .args(args)
        .output()
        .expect("Failed to run alignflow")
}

fn run_ok(home: &Path, args: &[&str]) -> String {
    let output = run(home, args);
    assert!(
        output.status.success(),
        "Command {:?} should succeed. stdout: {}\nstderr: {}",
        args,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn run_json(home: &Path, args: &[&str]) -> Value {
    let stdout = run_ok(home, args);
    serde_json::from_str(&stdout).expect("Output should be JSON")
}

// =============================================================================
// CREATION FLOW
// =============================================================================

/// Test that a draft goes through both creation approvals to published
#[test]
fn test_okr_creation_flow() {
    let home = setup();
    let dir = home.path();
    let content = dir.join("content.json");

    run_ok(dir, &["--as", "e1", "okr", "create"]);
    let list = run_json(dir, &["--as", "e1", "okr", "list", "--mine", "--json"]);
    let okrs = list.as_array().unwrap();
    assert_eq!(okrs.len(), 1);
    assert_eq!(okrs[0]["status"], "DRAFT");
    let id = okrs[0]["id"].as_str().unwrap().to_string();
    let prefix = &id[..8];

    run_ok(dir, &["--as", "e1", "okr", "edit", prefix, "--file", content.to_str().unwrap()]);
    run_ok(dir, &["--as", "e1", "okr", "submit", prefix]);

    let queue = run_json(dir, &["--as", "h1", "queue", "--json"]);
    assert_eq!(queue["badges"]["approvals"], 1);
    assert_eq!(queue["items"][0]["kind"], "approve_creation");

    run_ok(dir, &["--as", "h1", "okr", "approve", prefix]);
    run_ok(dir, &["--as", "gm", "okr", "approve", prefix]);

    let shown = run_json(dir, &["okr", "show", &id, "--json"]);
    assert_eq!(shown["status"], "PUBLISHED");
    assert_eq!(shown["title"], "Crypto H1");
    assert_eq!(shown["approvals"].as_array().unwrap().len(), 2);

    let audit = std::fs::read_to_string(dir.join("audit.jsonl")).unwrap();
    assert!(audit.lines().count() >= 5, "Every change should be audited");
}

/// Test that approving as the wrong user fails and leaves the record alone
#[test]
fn test_okr_approve_wrong_user() {
    let home = setup();
    let dir = home.path();
    let content = dir.join("content.json");

    run_ok(dir, &["--as", "e1", "okr", "create"]);
    let list = run_json(dir, &["okr", "list", "--json"]);
    let id = list[0]["id"].as_str().unwrap().to_string();
    run_ok(dir, &["--as", "e1", "okr", "edit", &id, "--file", content.to_str().unwrap()]);
    run_ok(dir, &["--as", "e1", "okr", "submit", &id]);

    let output = run(dir, &["--as", "gm", "okr", "approve", &id]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR:"), "stderr: {}", stderr);

    let shown = run_json(dir, &["okr", "show", &id, "--json"]);
    assert_eq!(shown["status"], "PENDING_L1_CREATE");
}

// =============================================================================
// ERRORS AND SETUP
// =============================================================================

/// Test that a missing organization file produces a helpful error
#[test]
fn test_missing_org_file() {
    let home = TempDir::new().unwrap();
    let output = run(home.path(), &["okr", "list"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Organization file not found"));
    assert!(stderr.contains("--org"));
}

/// Test that JSON mode reports failures as JSON on stdout
#[test]
fn test_json_error_output() {
    let home = setup();
    let output = run(home.path(), &["okr", "show", "deadbeef", "--json"]);
    assert!(!output.status.success());
    let value: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["status"], "failed");
    assert!(value["error"].as_str().unwrap().contains("deadbeef"));
}

/// Test that commands changing records need an acting user
#[test]
fn test_create_requires_acting_user() {
    let home = setup();
    let output = run(home.path(), &["okr", "create"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--as"));
}

/// Test resolving a role and listing workflows
#[test]
fn test_resolve_and_workflows() {
    let home = setup();
    let dir = home.path();

    let resolved = run_json(dir, &["resolve", "TECH_HEAD", "-d", "Crypto", "--json"]);
    assert_eq!(resolved["user"]["id"], "h1");
    assert_eq!(resolved["scope"], "department");

    let workflows = run_json(dir, &["workflows", "--json"]);
    assert!(!workflows["workflows"].as_array().unwrap().is_empty());

    let config = run_json(dir, &["config", "--json"]);
    assert_eq!(config["config_exists"], false);
}
