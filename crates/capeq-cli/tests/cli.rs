//! Integration tests for the `capeq` binary

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

const SCENARIO: &str = r#"
devices = ["wind", "solar"]
rounds = 2

[[agents]]
name = "north"
capital_costs = [1.0, 1.0]
limits = [10.0, 10.0]

[[agents]]
name = "south"
capital_costs = [1.0, 1.0]
limits = [10.0, 10.0]

[[nodes]]
lower = [0.0, 0.0]
upper = [10.0, 10.0]

[[surrogates]]
kind = "linear"
coefficients = [1.0, 1.0]

[[surrogates]]
kind = "linear"
coefficients = [1.0, 1.0]

[scale]
capacity = 10.0

[settings]
seed = 11

[settings.evolutionary]
popsize = 10
max_generations = 50
restarts = 1

[settings.gradient]
restarts = 1
max_iterations = 200

[settings.grid]
steps = [2.5, 2.5]
"#;

fn write_scenario(dir: &TempDir, text: &str) -> PathBuf {
    let path = dir.path().join("scenario.toml");
    fs::write(&path, text).unwrap();
    path
}

fn read_report(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_help_lists_subcommands() {
    let mut cmd = cargo_bin_cmd!("capeq");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("validate"));
}

#[test]
fn test_validate_accepts_scenario() {
    let dir = TempDir::new().unwrap();
    let scenario = write_scenario(&dir, SCENARIO);
    let mut cmd = cargo_bin_cmd!("capeq");
    cmd.args(["validate", "--scenario"])
        .arg(&scenario)
        .assert()
        .success()
        .stdout(predicate::str::contains("Scenario is valid"))
        .stdout(predicate::str::contains(
            "2 agent(s), 2 device type(s), 1 node(s)",
        ));
}

#[test]
fn test_validate_rejects_shape_mismatch() {
    let dir = TempDir::new().unwrap();
    let broken = SCENARIO.replacen("limits = [10.0, 10.0]", "limits = [10.0]", 1);
    let scenario = write_scenario(&dir, &broken);
    let mut cmd = cargo_bin_cmd!("capeq");
    cmd.args(["validate", "--scenario"])
        .arg(&scenario)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Shape mismatch"));
}

#[test]
fn test_run_missing_scenario_fails() {
    let mut cmd = cargo_bin_cmd!("capeq");
    cmd.args(["run", "--scenario", "/nonexistent/scenario.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("reading scenario file"));
}

#[test]
fn test_run_rejects_infinite_deadline() {
    let dir = TempDir::new().unwrap();
    let scenario = write_scenario(&dir, SCENARIO);
    let mut cmd = cargo_bin_cmd!("capeq");
    cmd.args(["run", "--deadline-secs", "inf", "--scenario"])
        .arg(&scenario)
        .assert()
        .failure()
        .stderr(predicate::str::contains("deadline must be a finite"));
}

#[test]
fn test_validate_rejects_wrong_grid_step_count() {
    let dir = TempDir::new().unwrap();
    let broken = SCENARIO.replace("steps = [2.5, 2.5]", "steps = [2.5, 2.5, 2.5]");
    let scenario = write_scenario(&dir, &broken);
    let mut cmd = cargo_bin_cmd!("capeq");
    cmd.args(["validate", "--scenario"])
        .arg(&scenario)
        .assert()
        .failure()
        .stderr(predicate::str::contains("grid steps"));
}

#[test]
fn test_run_writes_report() {
    let dir = TempDir::new().unwrap();
    let scenario = write_scenario(&dir, SCENARIO);
    let out = dir.path().join("report.json");

    let mut cmd = cargo_bin_cmd!("capeq");
    cmd.args(["run", "--rounds", "3", "--scenario"])
        .arg(&scenario)
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Report written to"));

    let report = read_report(&out);
    assert_eq!(report["strategy"], "evolutionary");
    assert_eq!(report["rounds_completed"], 3);
    assert_eq!(report["interrupted"], false);
    assert_eq!(report["seed"], 11);
    let agents = report["agents"].as_array().unwrap();
    assert_eq!(agents.len(), 2);
    assert_eq!(agents[0]["name"], "north");
    assert_eq!(
        agents[1]["history"]["entries"].as_array().unwrap().len(),
        3
    );
    assert_eq!(report["rounds"].as_array().unwrap().len(), 3);
}

#[test]
fn test_run_grid_prints_json_to_stdout() {
    let dir = TempDir::new().unwrap();
    let scenario = write_scenario(&dir, SCENARIO);

    let mut cmd = cargo_bin_cmd!("capeq");
    let output = cmd
        .args(["run", "--strategy", "grid", "--scenario"])
        .arg(&scenario)
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["strategy"], "grid");
    // Round budget comes from the scenario file
    assert_eq!(report["rounds_requested"], 2);
    for agent in report["agents"].as_array().unwrap() {
        for v in agent["final_capacity"].as_array().unwrap() {
            let v = v.as_f64().unwrap();
            assert!((0.0..=10.0).contains(&v));
        }
    }
}

#[test]
fn test_run_gradient_strategy() {
    let dir = TempDir::new().unwrap();
    let scenario = write_scenario(&dir, SCENARIO);
    let out = dir.path().join("gradient.json");

    let mut cmd = cargo_bin_cmd!("capeq");
    cmd.args([
        "run",
        "--strategy",
        "gradient",
        "--rounds",
        "1",
        "--seed",
        "5",
        "--scenario",
    ])
    .arg(&scenario)
    .arg("--out")
    .arg(&out)
    .assert()
    .success();

    let report = read_report(&out);
    assert_eq!(report["strategy"], "gradient");
    assert_eq!(report["seed"], 5);
    assert_eq!(report["rounds_completed"], 1);
}
