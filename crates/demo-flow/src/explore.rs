//! Autonomous exploration: check, act, observe, capture and recover per element.

use std::collections::HashSet;

use pagewatch_core_types::location::{is_scriptable, normalize_url, same_location};
use pagewatch_core_types::{
    Action, AssertionType, DemoResult, ExplorationMode, ExplorationPlan, ExplorationTarget,
    LoadOutcome, RunStatus, StepResult, TestPlan, TestStep,
};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::FlowError;
use crate::orchestrator::DemoEngine;
use crate::persist::{PersistRequest, Thumbnail};
use crate::runner::{load_result, RoundRunner};
use crate::types::RunOptions;

/// Metadata flag on results synthesized for an element whose exploration failed.
pub const SKIPPED: &str = "skipped";

/// Numbers the steps an exploration issues and keeps them for the synthesized plan.
#[derive(Debug)]
struct StepLog {
    next: u32,
    issued: Vec<TestStep>,
}

impl StepLog {
    fn new() -> Self {
        Self {
            next: 1,
            issued: Vec::new(),
        }
    }

    fn issue(&mut self, description: impl Into<String>, action: Action) -> TestStep {
        let step = TestStep::new(self.next, description, action);
        self.next += 1;
        self.issued.push(step.clone());
        step
    }

    /// Records an engine-synthesized step, which keeps its own number.
    fn record(&mut self, step: TestStep) -> TestStep {
        self.issued.push(step.clone());
        step
    }
}

impl DemoEngine {
    /// Explores every target of the plan. Failures of one element never stop the others.
    pub async fn run_exploration(&self, plan: &ExplorationPlan, options: RunOptions) -> DemoResult {
        info!(
            target: "demo-flow",
            url = %plan.base_url,
            targets = plan.targets.len(),
            mode = ?plan.mode,
            "exploring"
        );
        let started = Instant::now();
        self.start_recording(options.allow_recording).await;

        let runner = self.runner();
        let mut log = StepLog::new();
        let mut steps: Vec<StepResult> = Vec::new();

        let open = log.issue(
            format!("Open {}", plan.base_url),
            Action::Navigate {
                target: plan.base_url.clone(),
            },
        );
        steps.push(runner.run_background(&open).await);
        steps.push(self.screenshot_step(&runner, &mut log, "Initial state").await);

        if !plan.form_fill_steps.is_empty() {
            self.fill_forms(&runner, &mut log, &plan.form_fill_steps, &mut steps)
                .await;
        }

        // Destinations some earlier click actually reached.
        let mut visited: HashSet<String> = HashSet::new();
        for target in &plan.targets {
            let destination = match (&plan.mode, &target.href) {
                (ExplorationMode::Smart, Some(href)) => Some((href, normalize_url(href))),
                _ => None,
            };
            if let Some((href, normalized)) = &destination {
                if visited.contains(normalized) {
                    debug!(target: "demo-flow", label = %target.label, url = %href, "already visited");
                    let step = log.issue(format!("Click {}", target.label), click_action(target));
                    steps.push(StepResult::passed(
                        step.step_number,
                        step.kind(),
                        format!("Skipped (already visited {href})"),
                    ));
                    continue;
                }
            }

            match self
                .explore_element(&runner, target, &mut log, &mut steps)
                .await
            {
                Ok(true) => {
                    if let Some((_, normalized)) = destination {
                        visited.insert(normalized);
                    }
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(
                        target: "demo-flow",
                        label = %target.label,
                        selector = %target.selector,
                        %err,
                        "element exploration failed"
                    );
                    let mut skipped = StepResult::passed(
                        log.next - 1,
                        "click",
                        format!("SKIPPED: {}", target.label),
                    )
                    .with_metadata(SKIPPED, Value::Bool(true));
                    skipped.error = Some(err.to_string());
                    steps.push(skipped);
                }
            }
        }

        self.restore_base(&runner, &mut log, &plan.base_url, &mut steps)
            .await;
        steps.push(self.screenshot_step(&runner, &mut log, "Final state").await);

        let video = self.stop_recording().await;
        let plan_id = format!("explore-{}", Uuid::new_v4());
        let mut result = DemoResult::from_steps(plan_id.clone(), steps, started.elapsed(), None);
        result.video_metadata = video.as_ref().map(|artifact| artifact.metadata.clone());

        let name = options
            .demo_name
            .unwrap_or_else(|| format!("Exploration of {}", plan.base_url));
        let thumbnail = result
            .screenshots
            .first()
            .map(|capture| capture.data_url.clone());
        self.persist(PersistRequest {
            demo_name: name.clone(),
            test_plan: TestPlan {
                id: plan_id,
                name,
                url: Some(plan.base_url.clone()),
                steps: log.issued,
            },
            result: &result,
            video,
            status: RunStatus::Complete,
            thumbnail: Thumbnail::Provided(thumbnail),
        })
        .await;

        info!(
            target: "demo-flow",
            url = %plan.base_url,
            passed = result.passed,
            elapsed_ms = result.duration,
            summary = %result.summary,
            "exploration finished"
        );
        result
    }

    async fn fill_forms(
        &self,
        runner: &RoundRunner<'_>,
        log: &mut StepLog,
        form_steps: &[TestStep],
        sink: &mut Vec<StepResult>,
    ) {
        let batch: Vec<TestStep> = form_steps
            .iter()
            .map(|step| log.issue(step.description.clone(), step.action.clone()))
            .collect();
        runner.ensure_executor().await;
        match self.executor.execute_plan(&batch).await {
            Ok(mut results) => {
                runner.capture_pending(&mut results, false).await;
                sink.extend(results);
            }
            Err(err) => {
                warn!(target: "demo-flow", steps = batch.len(), %err, "form fill dispatch failed");
                let first = &batch[0];
                sink.push(StepResult::failed(
                    first.step_number,
                    first.kind(),
                    "Form fill",
                    err.to_string(),
                ));
            }
        }
    }

    /// Per-element state machine. Returns whether the click went through; an `Err` means the
    /// element is skipped as a whole.
    async fn explore_element(
        &self,
        runner: &RoundRunner<'_>,
        target: &ExplorationTarget,
        log: &mut StepLog,
        sink: &mut Vec<StepResult>,
    ) -> Result<bool, FlowError> {
        runner.ensure_executor().await;

        let check = log.issue(
            format!("Check {} is actionable", target.label),
            Action::Assert {
                selector: Some(target.selector.clone()),
                selector_fallback: target.selector_fallback.clone(),
                assertion_type: AssertionType::Actionable,
                expected: None,
            },
        );
        let verdict = single_result(self.executor.execute_plan(&[check.clone()]).await?)?;
        if !verdict.passed {
            let reason = verdict.error.as_deref().unwrap_or("not actionable");
            debug!(
                target: "demo-flow",
                label = %target.label,
                selector = %target.selector,
                reason,
                "element not actionable"
            );
            sink.push(StepResult::passed(
                check.step_number,
                check.kind(),
                format!("Skipped ({reason})"),
            ));
            return Ok(false);
        }
        sink.push(verdict);

        let prior = self.driver.current_location().await?;

        let click = log.issue(format!("Click {}", target.label), click_action(target));
        let clicked = single_result(self.executor.execute_plan(&[click]).await?)?;
        let effects = clicked.click_effects();
        let click_passed = clicked.passed;
        sink.push(clicked);
        if !click_passed {
            return Ok(false);
        }

        if effects.url_changed && effects.modal.is_none() {
            match self
                .driver
                .wait_for_load(self.ctx.timings.load_timeout())
                .await
            {
                LoadOutcome::Completed => {}
                LoadOutcome::TimedOut => debug!(
                    target: "demo-flow",
                    label = %target.label,
                    "no load signal, assuming client-side navigation"
                ),
                LoadOutcome::Failed(reason) => debug!(
                    target: "demo-flow",
                    label = %target.label,
                    %reason,
                    "load after click failed"
                ),
            }
            runner.ensure_executor().await;
        }

        tokio::time::sleep(self.ctx.timings.settle_delay()).await;
        let label = format!("After clicking {}", target.label);
        sink.push(self.screenshot_step(runner, log, &label).await);

        if let Some(modal) = &effects.modal {
            let dismiss = log.issue(
                format!("Dismiss {} opened by {}", modal_name(&modal.kind), target.label),
                Action::DismissModal {
                    hint: modal.dismiss_hint.clone(),
                },
            );
            match self.executor.execute_plan(&[dismiss]).await {
                Ok(results) => {
                    if let Some(result) = results.into_iter().find(StepResult::reported_effect) {
                        sink.push(result);
                    }
                }
                Err(err) => debug!(target: "demo-flow", %err, "modal dismissal failed"),
            }
        }

        if effects.url_changed {
            self.recover(runner, log, &prior, sink).await;
        }
        Ok(true)
    }

    /// Returns the target to `prior` after a click navigated away.
    async fn recover(
        &self,
        runner: &RoundRunner<'_>,
        log: &mut StepLog,
        prior: &str,
        sink: &mut Vec<StepResult>,
    ) {
        if let Err(err) = self.try_recover(runner, log, prior, sink).await {
            warn!(
                target: "demo-flow",
                url = %prior,
                %err,
                "recovery failed, navigating directly"
            );
            let step = log.record(TestStep::recovery_navigate(prior));
            let mut result = load_result(&step, self.driver.navigate(prior).await);
            if !result.passed {
                result.fail(format!("recovery failed: {err}"));
            }
            sink.push(result);
            runner.ensure_executor().await;
        }
    }

    async fn try_recover(
        &self,
        runner: &RoundRunner<'_>,
        log: &mut StepLog,
        prior: &str,
        sink: &mut Vec<StepResult>,
    ) -> Result<(), FlowError> {
        let current = self.driver.current_location().await?;
        if !is_scriptable(&current) {
            debug!(target: "demo-flow", url = %current, "not scriptable, navigating back directly");
            let step = log.record(TestStep::recovery_navigate(prior));
            sink.push(runner.run_background(&step).await);
            runner.ensure_executor().await;
            return Ok(());
        }

        let back = log.record(TestStep::new(
            pagewatch_core_types::ENGINE_STEP,
            "Go back",
            Action::GoBack,
        ));
        sink.push(runner.run_background(&back).await);
        runner.ensure_executor().await;

        let landed = self.driver.current_location().await?;
        if !same_location(&landed, prior) {
            debug!(
                target: "demo-flow",
                url = %landed,
                expected = %prior,
                "history back landed elsewhere"
            );
            let step = log.record(TestStep::recovery_navigate(prior));
            sink.push(runner.run_background(&step).await);
            runner.ensure_executor().await;
        }

        self.wait_dom_stable().await;
        Ok(())
    }

    /// Bounded wait for the page to stop mutating. Timeouts and failures are ignored.
    async fn wait_dom_stable(&self) {
        let limit = self.ctx.timings.dom_stable_timeout();
        let probe = TestStep::new(
            pagewatch_core_types::ENGINE_STEP,
            "Wait for DOM stability",
            Action::Wait {
                timeout: Some(limit.as_millis() as u64),
                condition: Some("dom_stable".to_string()),
                selector: None,
            },
        );
        match tokio::time::timeout(limit, self.executor.execute_plan(&[probe])).await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => debug!(target: "demo-flow", %err, "dom stability probe failed"),
            Err(_) => debug!(
                target: "demo-flow",
                elapsed_ms = limit.as_millis() as u64,
                "dom did not settle"
            ),
        }
    }

    async fn restore_base(
        &self,
        runner: &RoundRunner<'_>,
        log: &mut StepLog,
        base_url: &str,
        sink: &mut Vec<StepResult>,
    ) {
        match self.driver.current_location().await {
            Ok(current) if same_location(&current, base_url) => {}
            Ok(current) => {
                debug!(target: "demo-flow", url = %base_url, from = %current, "restoring base url");
                let step = log.record(TestStep::recovery_navigate(base_url));
                sink.push(runner.run_background(&step).await);
                runner.ensure_executor().await;
            }
            Err(err) => debug!(
                target: "demo-flow",
                %err,
                "could not read location before final capture"
            ),
        }
    }

    /// Throttled capture recorded as a screenshot step. A failure becomes a failed step.
    async fn screenshot_step(
        &self,
        runner: &RoundRunner<'_>,
        log: &mut StepLog,
        label: &str,
    ) -> StepResult {
        let step = log.issue(label, Action::Screenshot { target: None });
        let started = Instant::now();
        match runner.capture().await {
            Ok(data_url) => {
                let mut result = StepResult::passed(step.step_number, step.kind(), label);
                result.attach_screenshot(data_url);
                result.with_duration(started.elapsed())
            }
            Err(err) => {
                warn!(target: "demo-flow", step = step.step_number, label, %err, "capture failed");
                StepResult::failed(step.step_number, step.kind(), label, err.to_string())
                    .with_duration(started.elapsed())
            }
        }
    }
}

fn click_action(target: &ExplorationTarget) -> Action {
    Action::Click {
        selector: target.selector.clone(),
        selector_fallback: target.selector_fallback.clone(),
    }
}

fn modal_name(kind: &str) -> &str {
    if kind.is_empty() {
        "modal"
    } else {
        kind
    }
}

fn single_result(results: Vec<StepResult>) -> Result<StepResult, FlowError> {
    results
        .into_iter()
        .next()
        .ok_or_else(|| FlowError::UnexpectedResponse("executor returned no result".into()))
}
