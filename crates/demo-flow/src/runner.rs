//! Executes one round against a live target.

use std::time::Duration;

use pagewatch_core_types::{Action, LoadOutcome, StepResult, TestStep};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::errors::FlowError;
use crate::planner::Round;
use crate::ports::{ActionExecutor, PortError, TargetDriver};
use crate::types::RunContext;

/// Metadata flag set on navigation results whose load never signalled completion.
pub const LOAD_TIMED_OUT: &str = "loadTimedOut";

pub struct RoundRunner<'a> {
    driver: &'a dyn TargetDriver,
    executor: &'a dyn ActionExecutor,
    ctx: &'a RunContext,
}

impl<'a> RoundRunner<'a> {
    pub fn new(
        driver: &'a dyn TargetDriver,
        executor: &'a dyn ActionExecutor,
        ctx: &'a RunContext,
    ) -> Self {
        Self {
            driver,
            executor,
            ctx,
        }
    }

    /// Runs the round, appending every produced result to `sink` as soon as it exists.
    ///
    /// Driver failures are absorbed into failed results. Only an executor dispatch failure
    /// escapes, leaving the background results already in `sink`.
    pub async fn run(&self, round: &Round, sink: &mut Vec<StepResult>) -> Result<(), FlowError> {
        for step in &round.background_steps {
            let result = self.run_background(step).await;
            sink.push(result);
        }

        if round.content_steps.is_empty() {
            return Ok(());
        }

        if !self.ensure_executor().await {
            debug!(target: "demo-flow", "executor still unavailable, dispatching anyway");
        }
        let mut results = self.executor.execute_plan(&round.content_steps).await?;
        if results.len() < round.content_steps.len() {
            debug!(
                target: "demo-flow",
                reported = results.len(),
                dispatched = round.content_steps.len(),
                "executor stopped early"
            );
        }
        self.capture_pending(&mut results, false).await;
        sink.extend(results);
        Ok(())
    }

    /// Dispatches a driver-level step. Never fails; failures become failed results.
    pub async fn run_background(&self, step: &TestStep) -> StepResult {
        let started = Instant::now();
        let outcome = match &step.action {
            Action::Navigate { target } => self.driver.navigate(target).await,
            Action::GoBack => self.driver.go_back().await,
            Action::Wait { timeout, .. } => {
                let delay = timeout
                    .map(Duration::from_millis)
                    .unwrap_or_else(|| self.ctx.timings.default_wait());
                tokio::time::sleep(delay).await;
                Ok(LoadOutcome::Completed)
            }
            other => Err(PortError::Driver(format!(
                "{} is not a driver action",
                other.kind()
            ))),
        };
        let result = load_result(step, outcome).with_duration(started.elapsed());
        debug!(
            target: "demo-flow",
            step = step.step_number,
            action = step.kind(),
            passed = result.passed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "background step done"
        );
        result
    }

    /// Probes the executor and injects it when nothing answers. Returns whether it answered.
    pub async fn ensure_executor(&self) -> bool {
        if self.executor.ping().await {
            return true;
        }
        debug!(target: "demo-flow", "executor did not answer ping, injecting");
        if let Err(err) = self.driver.inject_executor().await {
            warn!(target: "demo-flow", %err, "executor injection failed");
            return false;
        }
        self.executor.ping().await
    }

    /// Captures every screenshot the executor could not take itself, in result order.
    pub async fn capture_pending(&self, results: &mut [StepResult], refocus: bool) {
        for result in results.iter_mut() {
            if !result.needs_background_screenshot() {
                continue;
            }
            if refocus {
                if let Err(err) = self.driver.focus_target().await {
                    debug!(target: "demo-flow", %err, "focus before capture failed");
                }
            }
            match self.capture().await {
                Ok(data_url) => result.attach_screenshot(data_url),
                Err(err) => {
                    warn!(
                        target: "demo-flow",
                        step = result.step_number,
                        %err,
                        "screenshot capture failed"
                    );
                    result.fail(format!("screenshot capture failed: {err}"));
                }
            }
            result.clear_background_screenshot();
        }
    }

    /// Throttled capture.
    pub async fn capture(&self) -> Result<String, PortError> {
        self.ctx.throttle.wait().await;
        self.driver.capture_screenshot().await
    }
}

/// Converts a driver outcome into the step's result.
pub(crate) fn load_result(step: &TestStep, outcome: Result<LoadOutcome, PortError>) -> StepResult {
    match outcome {
        Ok(LoadOutcome::Completed) => {
            StepResult::passed(step.step_number, step.kind(), &step.description)
        }
        Ok(LoadOutcome::TimedOut) => {
            StepResult::passed(step.step_number, step.kind(), &step.description)
                .with_metadata(LOAD_TIMED_OUT, Value::Bool(true))
        }
        Ok(LoadOutcome::Failed(reason)) => {
            StepResult::failed(step.step_number, step.kind(), &step.description, reason)
        }
        Err(err) => StepResult::failed(
            step.step_number,
            step.kind(),
            &step.description,
            err.to_string(),
        ),
    }
}
