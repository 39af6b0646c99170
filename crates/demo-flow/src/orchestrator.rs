//! Full-plan orchestration: rounds, recording around the run, persistence.

use std::sync::Arc;

use pagewatch_core_types::{DemoResult, RecordingArtifact, RunStatus, StepResult, TestPlan};
use tokio::sync::{Mutex, OnceCell};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::EngineTimings;
use crate::persist::{PersistRequest, Thumbnail};
use crate::planner::group_step_rounds;
use crate::ports::{ActionExecutor, CaptureSubsystem, ResultStore, TargetDriver};
use crate::recording::RecordingSession;
use crate::runner::RoundRunner;
use crate::throttle::ScreenshotThrottle;
use crate::types::{RunContext, RunOptions};

/// Invoked with the store id after every successful save.
pub type SavedCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Runs plans and explorations against one target.
///
/// Runs never fail from the caller's point of view: every path ends in a [`DemoResult`].
pub struct DemoEngine {
    pub(crate) driver: Arc<dyn TargetDriver>,
    pub(crate) executor: Arc<dyn ActionExecutor>,
    pub(crate) store: Arc<dyn ResultStore>,
    pub(crate) recording: Option<Mutex<RecordingSession>>,
    pub(crate) ctx: RunContext,
    pub(crate) on_saved: Option<SavedCallback>,
    pub(crate) store_ready: OnceCell<()>,
}

impl DemoEngine {
    pub fn new(
        driver: Arc<dyn TargetDriver>,
        executor: Arc<dyn ActionExecutor>,
        store: Arc<dyn ResultStore>,
        timings: EngineTimings,
    ) -> Self {
        Self {
            driver,
            executor,
            store,
            recording: None,
            ctx: RunContext::new(timings),
            on_saved: None,
            store_ready: OnceCell::new(),
        }
    }

    pub fn with_capture(mut self, capture: Arc<dyn CaptureSubsystem>) -> Self {
        self.recording = Some(Mutex::new(RecordingSession::new(capture)));
        self
    }

    pub fn on_saved(mut self, callback: SavedCallback) -> Self {
        self.on_saved = Some(callback);
        self
    }

    /// The throttle shared by every run of this engine.
    pub fn throttle(&self) -> &ScreenshotThrottle {
        &self.ctx.throttle
    }

    pub fn timings(&self) -> &EngineTimings {
        &self.ctx.timings
    }

    pub(crate) fn runner(&self) -> RoundRunner<'_> {
        RoundRunner::new(self.driver.as_ref(), self.executor.as_ref(), &self.ctx)
    }

    /// Runs a fixed plan round by round.
    pub async fn run_plan(&self, plan: &TestPlan, options: RunOptions) -> DemoResult {
        info!(target: "demo-flow", plan = %plan.id, steps = plan.steps.len(), "running plan");
        let started = Instant::now();
        self.start_recording(options.allow_recording).await;

        let rounds = group_step_rounds(&plan.steps);
        let runner = self.runner();
        let mut steps: Vec<StepResult> = Vec::with_capacity(plan.steps.len());
        let mut aborted: Option<String> = None;

        for (index, round) in rounds.iter().enumerate() {
            debug!(
                target: "demo-flow",
                round = index + 1,
                rounds = rounds.len(),
                background = round.background_steps.len(),
                content = round.content_steps.len(),
                "starting round"
            );
            if let Err(err) = runner.run(round, &mut steps).await {
                warn!(target: "demo-flow", round = index + 1, %err, "round aborted the run");
                aborted = Some(err.to_string());
                break;
            }
        }

        if aborted.is_none() {
            runner.capture_pending(&mut steps, true).await;
        }

        let video = self.stop_recording().await;
        let mut result =
            DemoResult::from_steps(&plan.id, steps, started.elapsed(), aborted.as_deref());
        result.video_metadata = video.as_ref().map(|artifact| artifact.metadata.clone());

        let status = if aborted.is_some() {
            RunStatus::Error
        } else {
            RunStatus::Complete
        };
        self.persist(PersistRequest {
            demo_name: options.demo_name.unwrap_or_else(|| plan.name.clone()),
            test_plan: plan.clone(),
            result: &result,
            video,
            status,
            thumbnail: Thumbnail::Capture,
        })
        .await;

        if aborted.is_none() {
            match self.driver.reload().await {
                Ok(outcome) if !outcome.is_completed() => {
                    debug!(target: "demo-flow", ?outcome, "post-run reload did not complete")
                }
                Ok(_) => {}
                Err(err) => warn!(target: "demo-flow", %err, "post-run reload failed"),
            }
        }

        info!(
            target: "demo-flow",
            plan = %plan.id,
            passed = result.passed,
            elapsed_ms = result.duration,
            summary = %result.summary,
            "plan finished"
        );
        result
    }

    /// Best-effort start. A failure leaves the run without video.
    pub(crate) async fn start_recording(&self, allowed: bool) {
        let Some(recording) = &self.recording else {
            return;
        };
        if !allowed {
            debug!(target: "demo-flow", "recording not permitted for this run");
            return;
        }
        let mut session = recording.lock().await;
        if let Err(err) = session.start(&self.driver.target_id()).await {
            warn!(target: "demo-flow", %err, "recording unavailable");
            session.reset().await;
        }
    }

    /// Stops an active recording and always resets the session. Empty artifacts are dropped.
    pub(crate) async fn stop_recording(&self) -> Option<RecordingArtifact> {
        let recording = self.recording.as_ref()?;
        let mut session = recording.lock().await;
        let artifact = if session.is_recording() {
            match session.stop().await {
                Ok(artifact) if artifact.is_empty() => {
                    debug!(target: "demo-flow", "discarding empty recording");
                    None
                }
                Ok(artifact) => Some(artifact),
                Err(err) => {
                    warn!(target: "demo-flow", %err, "recording stop failed");
                    None
                }
            }
        } else {
            None
        };
        session.reset().await;
        artifact
    }
}
