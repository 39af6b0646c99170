use std::process::Command;
use std::time::Duration;

use assert_cmd::prelude::*;
use chrono::Utc;
use pagewatch_artifact_store::ArtifactStore;
use pagewatch_core_types::{DemoRecord, DemoResult, RunStatus, StepResult, TestPlan};
use serde_json::Value;
use tempfile::TempDir;

fn pagewatch(store: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("pagewatch"));
    cmd.env("PAGEWATCH_STORE", store.path())
        .env_remove("RUST_LOG")
        .args(["--config"])
        .arg(store.path().join("absent.yaml"));
    cmd
}

fn seed(store: &TempDir, name: &str, passed: bool) -> String {
    let step = if passed {
        StepResult::passed(1, "click", "Open menu")
    } else {
        StepResult::failed(1, "click", "Open menu", "element not found")
    };
    let results = DemoResult::from_steps("plan", vec![step], Duration::from_millis(40), None);
    let record = DemoRecord {
        demo_name: name.into(),
        test_plan_id: "plan".into(),
        timestamp: Utc::now(),
        duration: 40,
        file_size: 0,
        resolution: None,
        status: RunStatus::Complete,
        passed: results.passed,
        summary: results.summary.clone(),
        video: None,
        thumbnail: None,
        results,
        test_plan: TestPlan {
            id: "plan".into(),
            name: name.into(),
            url: None,
            steps: Vec::new(),
        },
    };
    let store = ArtifactStore::new(store.path(), 0);
    store.init().unwrap();
    store.save(&record).unwrap()
}

#[test]
fn list_reports_an_empty_store() {
    let store = tempfile::tempdir().unwrap();
    let assert = pagewatch(&store).arg("list").assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains("No runs in"), "unexpected output: {stdout}");
}

#[test]
fn list_prints_saved_runs_as_json() {
    let store = tempfile::tempdir().unwrap();
    let ok = seed(&store, "menu", true);
    let bad = seed(&store, "broken-menu", false);

    let assert = pagewatch(&store)
        .args(["--output", "json", "list", "--limit", "5"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let runs: Value = serde_json::from_str(&stdout).unwrap();
    let runs = runs.as_array().unwrap();
    assert_eq!(runs.len(), 2);
    let ids: Vec<_> = runs.iter().filter_map(|run| run["id"].as_str()).collect();
    assert!(ids.contains(&ok.as_str()));
    assert!(ids.contains(&bad.as_str()));
    let failed = runs
        .iter()
        .find(|run| run["id"].as_str() == Some(bad.as_str()))
        .unwrap();
    assert_eq!(failed["passed"], Value::Bool(false));
    assert_eq!(failed["summary"].as_str(), Some("0/1 steps passed"));
}

#[test]
fn list_honours_the_limit() {
    let store = tempfile::tempdir().unwrap();
    seed(&store, "a", true);
    seed(&store, "b", true);
    seed(&store, "c", true);
    let assert = pagewatch(&store)
        .args(["--output", "json", "list", "-n", "2"])
        .assert()
        .success();
    let runs: Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(runs.as_array().unwrap().len(), 2);
}

#[test]
fn run_rejects_a_missing_plan_file() {
    let store = tempfile::tempdir().unwrap();
    pagewatch(&store)
        .args(["run", "--plan"])
        .arg(store.path().join("nope.json"))
        .assert()
        .failure();
}
