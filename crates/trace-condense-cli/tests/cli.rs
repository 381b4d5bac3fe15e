// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(clippy::expect_used, clippy::unwrap_used)]
//! Command-line behavior against saved trace sets on disk.

#![allow(missing_docs)]
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use trace_condense::{Step, TraceEngine, UserTrace};

fn write_trace_set(dir: &Path) -> PathBuf {
    let mut engine = TraceEngine::default();
    for (user, labels) in [
        ("a", &["2"][..]),
        ("b", &["1", "2"][..]),
        ("c", &["1", "1", "2"][..]),
        ("d", &["1", "1", "1", "2"][..]),
    ] {
        let mut steps = vec![Step::start_marker()];
        steps.extend(labels.iter().map(|l| Step::click("button", *l)));
        engine
            .add_user(user.into(), UserTrace::from_steps(steps).into_shared())
            .unwrap();
    }
    let path = dir.join("traces.json");
    std::fs::write(&path, engine.serialize_all().unwrap().to_json().unwrap()).unwrap();
    path
}

fn cli(config_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("trace-condense").unwrap();
    cmd.arg("--config-dir").arg(config_dir);
    cmd
}

#[test]
fn condense_prints_the_model_summary() {
    let dir = TempDir::new().unwrap();
    let traces = write_trace_set(dir.path());
    cli(dir.path())
        .arg("condense")
        .arg(&traces)
        .assert()
        .success()
        .stdout(predicate::str::contains("states: 3"))
        .stdout(predicate::str::contains("click 1"))
        .stdout(predicate::str::contains("hash: "));
}

#[test]
fn condense_writes_json_and_model_file() {
    let dir = TempDir::new().unwrap();
    let traces = write_trace_set(dir.path());
    let out = dir.path().join("model.json");
    let output = cli(dir.path())
        .args(["condense", "--format", "json", "--out"])
        .arg(&out)
        .arg(&traces)
        .output()
        .unwrap();
    assert!(output.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["states"], 3);
    assert_eq!(summary["hash"].as_str().map(str::len), Some(64));

    let model: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(out).unwrap()).unwrap();
    assert_eq!(model["states"].as_array().map(Vec::len), Some(3));
}

#[test]
fn threshold_flag_overrides_config() {
    let dir = TempDir::new().unwrap();
    let traces = write_trace_set(dir.path());
    cli(dir.path())
        .args(["condense", "--threshold", "1000"])
        .arg(&traces)
        .assert()
        .success()
        .stdout(predicate::str::contains("states: 9"));
}

#[test]
fn negative_penalty_flag_is_rejected() {
    let dir = TempDir::new().unwrap();
    let traces = write_trace_set(dir.path());
    cli(dir.path())
        .args(["condense", "--penalty=-1"])
        .arg(&traces)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unmatched_penalty"));
}

#[test]
fn tree_prints_every_branch() {
    let dir = TempDir::new().unwrap();
    let traces = write_trace_set(dir.path());
    cli(dir.path())
        .arg("tree")
        .arg(&traces)
        .assert()
        .success()
        .stdout(predicate::str::contains("states: 9"))
        .stdout(predicate::str::contains("transitions: 8"));
}

#[test]
fn locate_reports_position_and_status() {
    let dir = TempDir::new().unwrap();
    let traces = write_trace_set(dir.path());
    cli(dir.path())
        .args(["locate", "--user", "b"])
        .arg(&traces)
        .assert()
        .success()
        .stdout(predicate::str::contains("b at s"))
        .stdout(predicate::str::contains("complete, 3 steps"));

    cli(dir.path())
        .args(["locate", "--user", "d"])
        .arg(&traces)
        .assert()
        .success()
        .stdout(predicate::str::contains("complete, 5 steps"));

    cli(dir.path())
        .args(["locate", "--user", "nobody"])
        .arg(&traces)
        .assert()
        .failure()
        .stderr(predicate::str::contains("nobody"));
}

#[test]
fn config_init_then_show() {
    let dir = TempDir::new().unwrap();
    cli(dir.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("condense.json"));
    assert!(dir.path().join("condense.json").exists());

    cli(dir.path())
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    std::fs::write(dir.path().join("condense.json"), r#"{"threshold": 1000.0}"#).unwrap();
    cli(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1000.0"))
        .stdout(predicate::str::contains("\"rounds\": 2"));
}

#[test]
fn missing_trace_file_fails_with_context() {
    let dir = TempDir::new().unwrap();
    cli(dir.path())
        .args(["tree", "does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}
