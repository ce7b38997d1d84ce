#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const OPERATOR_ARN: &str = "arn:aws:iam::123456789012:user/operator";

/// A `vandelay` invocation isolated from the caller's environment.
fn bare(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("vandelay").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("VANDELAY_CONFIG")
        .env_remove("AWS_IAM_ARN")
        .env_remove("S3_BUCKET")
        .env_remove("AWS_ACCOUNT_ID")
        .env_remove("AWS_REGION")
        .env_remove("RUST_LOG");
    cmd
}

/// A `vandelay` invocation with every required input supplied by env.
fn vandelay(dir: &TempDir) -> Command {
    let mut cmd = bare(dir);
    cmd.env("AWS_IAM_ARN", OPERATOR_ARN)
        .env("AWS_ACCOUNT_ID", "123456789012")
        .env("AWS_REGION", "us-east-1");
    cmd
}

fn init_stack(dir: &TempDir, mode: &str) {
    bare(dir).args(["init", "--mode", mode]).assert().success();
}

// ---------------------------------------------------------------------------
// vandelay init
// ---------------------------------------------------------------------------

#[test]
fn init_writes_config() {
    let dir = TempDir::new().unwrap();
    bare(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("created"));

    let content = std::fs::read_to_string(dir.path().join("vandelay.yaml")).unwrap();
    assert!(content.contains("mode: scheduled_serverless"));
    assert!(content.contains("MET_API_KEY"));
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let dir = TempDir::new().unwrap();
    init_stack(&dir, "scheduled_serverless");

    bare(&dir)
        .args(["init", "--mode", "persistent_accelerated"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    bare(&dir)
        .args(["init", "--mode", "persistent_accelerated", "--force"])
        .assert()
        .success();
    let content = std::fs::read_to_string(dir.path().join("vandelay.yaml")).unwrap();
    assert!(content.contains("mode: persistent_accelerated"));
}

#[test]
fn init_rejects_unknown_mode() {
    let dir = TempDir::new().unwrap();
    bare(&dir)
        .args(["init", "--mode", "hybrid"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("hybrid"));
    assert!(!dir.path().join("vandelay.yaml").exists());
}

// ---------------------------------------------------------------------------
// vandelay plan
// ---------------------------------------------------------------------------

#[test]
fn plan_without_config_fails() {
    let dir = TempDir::new().unwrap();
    vandelay(&dir)
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}

#[test]
fn plan_without_iam_arn_fails() {
    let dir = TempDir::new().unwrap();
    init_stack(&dir, "scheduled_serverless");

    bare(&dir)
        .env("AWS_ACCOUNT_ID", "123456789012")
        .env("AWS_REGION", "us-east-1")
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("iam_user_arn"));
}

#[test]
fn plan_prints_resource_table() {
    let dir = TempDir::new().unwrap();
    init_stack(&dir, "scheduled_serverless");

    vandelay(&dir)
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("NAME"))
        .stdout(predicate::str::contains("art-vandelay-vpc"))
        .stdout(predicate::str::contains("art-vandelay-scheduled-task"))
        .stderr(predicate::str::contains("latest"));
}

#[test]
fn plan_json_is_deterministic() {
    let dir = TempDir::new().unwrap();
    init_stack(&dir, "scheduled_serverless");

    let first = vandelay(&dir).args(["plan", "--json"]).output().unwrap();
    let second = vandelay(&dir).args(["plan", "--json"]).output().unwrap();
    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout);

    let plan: serde_json::Value = serde_json::from_slice(&first.stdout).unwrap();
    assert_eq!(plan["stack"], "art-vandelay");
    let resources = plan["resources"].as_array().unwrap();
    assert_eq!(resources[0]["name"], "art-vandelay-vpc");
    assert_eq!(
        resources.last().unwrap()["name"],
        "art-vandelay-scheduled-task"
    );
}

#[test]
fn plan_out_writes_yaml() {
    let dir = TempDir::new().unwrap();
    init_stack(&dir, "scheduled_serverless");

    vandelay(&dir)
        .args(["plan", "--out", "build/plan.yaml", "--format", "yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote"));

    let content = std::fs::read_to_string(dir.path().join("build/plan.yaml")).unwrap();
    assert!(content.contains("kind: workload"));
    assert!(content.contains("aws ecs run-task"));
}

#[test]
fn plan_save_writes_next_to_config() {
    let dir = TempDir::new().unwrap();
    init_stack(&dir, "scheduled_serverless");

    vandelay(&dir).args(["plan", "--save"]).assert().success();
    let content = std::fs::read_to_string(dir.path().join("vandelay.plan.json")).unwrap();
    let plan: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert!(plan["outputs"].as_array().is_some_and(|o| o.len() == 1));
}

#[test]
fn plan_format_wins_over_json() {
    let dir = TempDir::new().unwrap();
    init_stack(&dir, "scheduled_serverless");

    vandelay(&dir)
        .args(["plan", "--json", "--format", "yaml"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("stack: art-vandelay"))
        .stdout(predicate::str::contains("kind: workload"));
}

#[test]
fn plan_rejects_unknown_format() {
    let dir = TempDir::new().unwrap();
    init_stack(&dir, "scheduled_serverless");

    vandelay(&dir)
        .args(["plan", "--format", "toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown format"));
}

#[test]
fn accelerated_plan_requires_bucket_name() {
    let dir = TempDir::new().unwrap();
    init_stack(&dir, "persistent_accelerated");

    vandelay(&dir)
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("bucket.name"));

    vandelay(&dir)
        .env("S3_BUCKET", "art-vandelay-gpu")
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("art-vandelay-service"));
}

#[test]
fn config_found_from_subdirectory() {
    let dir = TempDir::new().unwrap();
    init_stack(&dir, "scheduled_serverless");
    let sub = dir.path().join("jobs/ingest");
    std::fs::create_dir_all(&sub).unwrap();

    vandelay(&dir)
        .current_dir(&sub)
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("art-vandelay-cluster"));
}

#[test]
fn explicit_config_path() {
    let dir = TempDir::new().unwrap();
    bare(&dir)
        .args(["--config", "stacks/gpu.yaml", "init", "--mode", "accelerated"])
        .assert()
        .success();

    vandelay(&dir)
        .env("VANDELAY_CONFIG", dir.path().join("stacks/gpu.yaml"))
        .env("S3_BUCKET", "art-vandelay-gpu")
        .arg("command")
        .assert()
        .success()
        .stdout(predicate::str::contains("aws ecs update-service"));
}

// ---------------------------------------------------------------------------
// vandelay command
// ---------------------------------------------------------------------------

#[test]
fn command_prints_run_task() {
    let dir = TempDir::new().unwrap();
    init_stack(&dir, "scheduled_serverless");

    vandelay(&dir)
        .arg("command")
        .assert()
        .success()
        .stdout(predicate::str::contains("aws ecs run-task"))
        .stdout(predicate::str::contains("--launch-type FARGATE"))
        .stdout(predicate::str::contains("subnets=[art-vandelay-vpc-public-1]"))
        .stdout(predicate::str::contains("assignPublicIp=ENABLED"));
}

#[test]
fn command_json_lists_outputs() {
    let dir = TempDir::new().unwrap();
    init_stack(&dir, "scheduled_serverless");

    let out = vandelay(&dir).args(["command", "--json"]).output().unwrap();
    assert!(out.status.success());
    let outputs: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(
        outputs[0]["name"],
        "art-vandelay-scheduled-task-adhoc-command"
    );
}

// ---------------------------------------------------------------------------
// vandelay validate
// ---------------------------------------------------------------------------

#[test]
fn validate_reports_warnings_but_succeeds() {
    let dir = TempDir::new().unwrap();
    init_stack(&dir, "scheduled_serverless");

    vandelay(&dir)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("[warning]"))
        .stdout(predicate::str::contains("latest"));
}

#[test]
fn validate_fails_on_missing_inputs() {
    let dir = TempDir::new().unwrap();
    init_stack(&dir, "scheduled_serverless");

    bare(&dir)
        .arg("validate")
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error]"))
        .stdout(predicate::str::contains("AWS_IAM_ARN"))
        .stdout(predicate::str::contains("AWS_REGION"));
}

#[test]
fn validate_json_lists_warnings() {
    let dir = TempDir::new().unwrap();
    init_stack(&dir, "scheduled_serverless");

    let out = vandelay(&dir).args(["validate", "--json"]).output().unwrap();
    assert!(out.status.success());
    let value: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let warnings = value["warnings"].as_array().unwrap();
    assert!(warnings.iter().all(|w| w["level"] == "warning"));
}
