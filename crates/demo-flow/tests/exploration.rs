//! Exploration runs: element isolation, side-effect detection and recovery.

mod support;

use demo_flow::{PortError, RunOptions};
use pagewatch_core_types::{
    Action, ExplorationMode, ExplorationPlan, ExplorationTarget, StepResult, DISMISSED,
    MODAL_DETECTED, URL_CHANGED,
};
use serde_json::{json, Value};
use support::*;

const BASE: &str = "https://app.test/";

fn target(selector: &str, label: &str) -> ExplorationTarget {
    ExplorationTarget {
        selector: selector.to_string(),
        selector_fallback: None,
        kind: "button".to_string(),
        label: label.to_string(),
        href: None,
        may_navigate: false,
    }
}

fn exploration(targets: Vec<ExplorationTarget>) -> ExplorationPlan {
    ExplorationPlan {
        base_url: BASE.to_string(),
        mode: ExplorationMode::Smart,
        targets,
        form_fill_steps: Vec::new(),
    }
}

fn selector_of(step: &pagewatch_core_types::TestStep) -> &str {
    step.action.selector().unwrap_or_default()
}

#[tokio::test(start_paused = true)]
async fn failing_element_is_skipped_and_others_complete() {
    let page = shared_page("about:blank");
    let executor = ScriptedExecutor::with_responder(
        page.clone(),
        |step, _| {
            if matches!(step.action, Action::Assert { .. }) && selector_of(step) == "#broken" {
                return Err(PortError::Executor("context destroyed".into()));
            }
            Ok(default_response(step))
        },
    );
    let h = harness(ScriptedDriver::new(page.clone()), executor);
    let plan = exploration(vec![
        target("#one", "One"),
        target("#broken", "Broken"),
        target("#three", "Three"),
    ]);

    let result = h.engine.run_exploration(&plan, RunOptions::default()).await;

    let skipped: Vec<&StepResult> = result
        .steps
        .iter()
        .filter(|step| step.description.starts_with("SKIPPED:"))
        .collect();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].description, "SKIPPED: Broken");
    assert!(skipped[0]
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("context destroyed"));

    let clicks: Vec<&str> = result
        .steps
        .iter()
        .filter(|step| step.action == "click" && step.description.starts_with("Click"))
        .map(|step| step.description.as_str())
        .collect();
    assert_eq!(clicks, vec!["Click One", "Click Three"]);
    assert!(result.passed, "{}", result.summary);

    let last = result.steps.last().expect("final screenshot");
    assert_eq!(last.description, "Final state");

    let records = h.store.records.lock();
    assert_eq!(records.len(), 1);
    assert!(records[0].test_plan.id.starts_with("explore-"));
    assert_eq!(records[0].thumbnail, result.screenshots.first().map(|c| c.data_url.clone()));
}

#[tokio::test(start_paused = true)]
async fn navigation_click_waits_captures_and_goes_back() {
    let page = shared_page("about:blank");
    let executor = ScriptedExecutor::with_responder(
        page.clone(),
        |step, page| {
            let result = default_response(step);
            if matches!(step.action, Action::Click { .. }) {
                page.visit("https://app.test/details");
                return Ok(result
                    .with_metadata(URL_CHANGED, Value::Bool(true))
                    .with_metadata(MODAL_DETECTED, Value::Null));
            }
            Ok(result)
        },
    );
    let h = harness(ScriptedDriver::new(page.clone()), executor);

    let result = h
        .engine
        .run_exploration(&exploration(vec![target("#more", "More")]), RunOptions::default())
        .await;

    assert!(result.passed, "{}", result.summary);
    let calls = page.lock().calls.clone();
    let wait = calls.iter().position(|c| c == "wait_for_load").expect("wait");
    let capture = calls[wait..]
        .iter()
        .position(|c| c == "screenshot")
        .map(|i| i + wait)
        .expect("capture after wait");
    let back = calls[capture..]
        .iter()
        .position(|c| c == "go_back")
        .map(|i| i + capture)
        .expect("go back after capture");
    assert!(calls[back..].iter().any(|c| c == "location"));
    assert!(!calls[back..]
        .iter()
        .any(|c| c == "navigate https://app.test/details"));
    assert!(result
        .steps
        .iter()
        .any(|step| step.action == "go_back" && step.passed));
    assert_eq!(page.lock().location, BASE);
}

#[tokio::test(start_paused = true)]
async fn history_mismatch_falls_back_to_direct_navigate() {
    let page = shared_page("about:blank");
    let executor = ScriptedExecutor::with_responder(
        page.clone(),
        |step, page| {
            let result = default_response(step);
            if matches!(step.action, Action::Click { .. }) {
                page.visit("https://app.test/next");
                return Ok(result.with_metadata(URL_CHANGED, Value::Bool(true)));
            }
            Ok(result)
        },
    );
    let mut driver = ScriptedDriver::new(page.clone());
    driver.back_lands_on = Some("https://elsewhere.test/".to_string());
    let h = harness(driver, executor);

    let result = h
        .engine
        .run_exploration(&exploration(vec![target("#next", "Next")]), RunOptions::default())
        .await;

    let recovery: Vec<&StepResult> = result
        .steps
        .iter()
        .filter(|step| step.step_number == 0 && step.action == "navigate")
        .collect();
    assert_eq!(recovery.len(), 1);
    assert_eq!(recovery[0].description, format!("Navigate back to {BASE}"));
    assert_eq!(page.lock().location, BASE);
}

#[tokio::test(start_paused = true)]
async fn unscriptable_destination_skips_history() {
    let page = shared_page("about:blank");
    let executor = ScriptedExecutor::with_responder(
        page.clone(),
        |step, page| {
            let result = default_response(step);
            if matches!(step.action, Action::Click { .. }) {
                page.visit("https://app.test/report.pdf");
                return Ok(result.with_metadata(URL_CHANGED, Value::Bool(true)));
            }
            Ok(result)
        },
    );
    let h = harness(ScriptedDriver::new(page.clone()), executor);

    h.engine
        .run_exploration(&exploration(vec![target("#pdf", "Report")]), RunOptions::default())
        .await;

    let page = page.lock();
    assert!(!page.calls.iter().any(|c| c == "go_back"));
    assert_eq!(page.location, BASE);
}

#[tokio::test(start_paused = true)]
async fn unactionable_element_is_a_skip_not_a_failure() {
    let page = shared_page("about:blank");
    let executor = ScriptedExecutor::with_responder(
        page.clone(),
        |step, _| {
            if matches!(step.action, Action::Assert { .. }) {
                return Ok(StepResult::failed(
                    step.step_number,
                    step.kind(),
                    &step.description,
                    "element hidden",
                ));
            }
            Ok(default_response(step))
        },
    );
    let h = harness(ScriptedDriver::new(page.clone()), executor);

    let result = h
        .engine
        .run_exploration(&exploration(vec![target("#ghost", "Ghost")]), RunOptions::default())
        .await;

    assert!(result.passed);
    assert!(result
        .steps
        .iter()
        .any(|step| step.description == "Skipped (element hidden)" && step.passed));
    assert!(!page
        .lock()
        .batches
        .iter()
        .any(|batch| batch.iter().any(|kind| kind == "click")));
}

#[tokio::test(start_paused = true)]
async fn modal_dismissal_recorded_only_with_effect() {
    let page = shared_page("about:blank");
    let executor = ScriptedExecutor::with_responder(
        page.clone(),
        |step, _| {
            let result = default_response(step);
            match &step.action {
                Action::Click { selector, .. } => {
                    let hint = if selector == "#a" { "button.close" } else { "button.noop" };
                    Ok(result.with_metadata(
                        MODAL_DETECTED,
                        json!({"type": "dialog", "dismissHint": hint}),
                    ))
                }
                Action::DismissModal { hint } => {
                    let effective = hint.as_deref() == Some("button.close");
                    Ok(result.with_metadata(DISMISSED, Value::Bool(effective)))
                }
                _ => Ok(result),
            }
        },
    );
    let h = harness(ScriptedDriver::new(page.clone()), executor);

    let result = h
        .engine
        .run_exploration(
            &exploration(vec![target("#a", "A"), target("#b", "B")]),
            RunOptions::default(),
        )
        .await;

    let dismissals = result
        .steps
        .iter()
        .filter(|step| step.action == "dismiss_modal")
        .count();
    let issued = page
        .lock()
        .batches
        .iter()
        .filter(|batch| batch.iter().any(|kind| kind == "dismiss_modal"))
        .count();
    assert_eq!(issued, 2);
    assert_eq!(dismissals, 1);
    assert!(!page.lock().calls.iter().any(|c| c == "wait_for_load"));
}

#[tokio::test(start_paused = true)]
async fn form_fill_dispatch_failure_is_one_failed_step() {
    let page = shared_page("about:blank");
    let executor = ScriptedExecutor::with_responder(
        page.clone(),
        |step, _| {
            if matches!(step.action, Action::Fill { .. }) {
                return Err(PortError::Executor("frame detached".into()));
            }
            Ok(default_response(step))
        },
    );
    let h = harness(ScriptedDriver::new(page.clone()), executor);
    let mut plan = exploration(vec![target("#go", "Go")]);
    plan.form_fill_steps = vec![
        step(
            1,
            Action::Fill {
                selector: "#email".to_string(),
                selector_fallback: None,
                value: "a@b.test".to_string(),
            },
        ),
        step(
            2,
            Action::Fill {
                selector: "#name".to_string(),
                selector_fallback: None,
                value: "Ada".to_string(),
            },
        ),
    ];

    let result = h.engine.run_exploration(&plan, RunOptions::default()).await;

    let failed: Vec<&StepResult> = result.failed_steps().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].description, "Form fill");
    assert!(result.steps.iter().any(|step| step.description == "Click Go"));
    assert!(!result.passed);
}

#[tokio::test(start_paused = true)]
async fn smart_mode_skips_repeated_destinations() {
    let page = shared_page("about:blank");
    let h = harness(
        ScriptedDriver::new(page.clone()),
        ScriptedExecutor::new(page.clone()),
    );
    let mut first = target("#nav-home", "Home");
    first.href = Some("https://app.test/home".to_string());
    let mut second = target("#logo", "Logo");
    second.href = Some("https://app.test/home/".to_string());

    let mut plan = exploration(vec![first.clone(), second.clone()]);
    let smart = h.engine.run_exploration(&plan, RunOptions::default()).await;
    assert!(smart
        .steps
        .iter()
        .any(|step| step.description.starts_with("Skipped (already visited")));

    plan.mode = ExplorationMode::Exhaustive;
    let exhaustive = h.engine.run_exploration(&plan, RunOptions::default()).await;
    assert!(exhaustive
        .steps
        .iter()
        .all(|step| !step.description.starts_with("Skipped (already visited")));
}

#[tokio::test(start_paused = true)]
async fn every_planned_step_has_a_result() {
    let page = shared_page("about:blank");
    let h = harness(
        ScriptedDriver::new(page.clone()),
        ScriptedExecutor::new(page.clone()),
    );

    let result = h
        .engine
        .run_exploration(&exploration(vec![target("#one", "One")]), RunOptions::default())
        .await;

    let check = result
        .steps
        .iter()
        .find(|step| step.action == "assert")
        .expect("actionability check");
    assert_eq!(check.description, "Check One is actionable");
    assert!(check.passed);

    let reported: Vec<u32> = result.steps.iter().map(|step| step.step_number).collect();
    let records = h.store.records.lock();
    let planned: Vec<u32> = records[0]
        .test_plan
        .steps
        .iter()
        .map(|step| step.step_number)
        .collect();
    assert_eq!(planned, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(reported, planned);
}

#[tokio::test(start_paused = true)]
async fn unreadable_location_recovers_with_direct_navigate() {
    let page = shared_page("about:blank");
    let executor = ScriptedExecutor::with_responder(
        page.clone(),
        |step, page| {
            let result = default_response(step);
            match &step.action {
                Action::Click { selector, .. } if selector == "#crash" => {
                    page.visit("https://app.test/crashed");
                    Ok(result.with_metadata(URL_CHANGED, Value::Bool(true)))
                }
                _ => Ok(result),
            }
        },
    );
    let mut driver = ScriptedDriver::new(page.clone());
    driver.location_fails_at = Some("https://app.test/crashed".to_string());
    let h = harness(driver, executor);

    let result = h
        .engine
        .run_exploration(
            &exploration(vec![target("#crash", "Crash"), target("#stay", "Stay")]),
            RunOptions::default(),
        )
        .await;

    let recovery: Vec<&StepResult> = result
        .steps
        .iter()
        .filter(|step| step.step_number == 0 && step.action == "navigate")
        .collect();
    assert_eq!(recovery.len(), 1);
    assert!(recovery[0].passed);
    assert!(!page.lock().calls.iter().any(|c| c == "go_back"));
    assert!(result.steps.iter().any(|step| step.description == "Click Stay"));
    assert!(result.passed, "{}", result.summary);
    assert_eq!(page.lock().location, BASE);
}

#[tokio::test(start_paused = true)]
async fn unactionable_target_does_not_mark_its_destination_visited() {
    let page = shared_page("about:blank");
    let executor = ScriptedExecutor::with_responder(
        page.clone(),
        |step, _| {
            if matches!(step.action, Action::Assert { .. }) && selector_of(step) == "#hidden" {
                return Ok(StepResult::failed(
                    step.step_number,
                    step.kind(),
                    &step.description,
                    "element hidden",
                ));
            }
            Ok(default_response(step))
        },
    );
    let h = harness(ScriptedDriver::new(page.clone()), executor);
    let mut hidden = target("#hidden", "Hidden home");
    hidden.href = Some("https://app.test/home".to_string());
    let mut logo = target("#logo", "Logo");
    logo.href = Some("https://app.test/home/".to_string());

    let result = h
        .engine
        .run_exploration(&exploration(vec![hidden, logo]), RunOptions::default())
        .await;

    assert!(result
        .steps
        .iter()
        .any(|step| step.description == "Skipped (element hidden)"));
    assert!(result.steps.iter().any(|step| step.description == "Click Logo"));
    assert!(result
        .steps
        .iter()
        .all(|step| !step.description.starts_with("Skipped (already visited")));
}
