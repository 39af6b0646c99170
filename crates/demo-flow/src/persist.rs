//! Hands finished runs to the result store.

use chrono::Utc;
use pagewatch_core_types::{DemoRecord, DemoResult, RecordingArtifact, RunStatus, TestPlan};
use tracing::{debug, info, warn};

use crate::orchestrator::DemoEngine;

pub(crate) enum Thumbnail {
    /// Take a fresh throttled capture of the target.
    Capture,
    /// Use an image the run already holds.
    Provided(Option<String>),
}

pub(crate) struct PersistRequest<'a> {
    pub demo_name: String,
    pub test_plan: TestPlan,
    pub result: &'a DemoResult,
    pub video: Option<RecordingArtifact>,
    pub status: RunStatus,
    pub thumbnail: Thumbnail,
}

impl DemoEngine {
    /// Saves the run. Failures are logged and never touch the result.
    pub(crate) async fn persist(&self, request: PersistRequest<'_>) -> Option<String> {
        let ready = self
            .store_ready
            .get_or_try_init(|| async { self.store.init().await })
            .await;
        if let Err(err) = ready {
            warn!(target: "demo-flow", %err, "result store unavailable");
            return None;
        }

        let thumbnail = match request.thumbnail {
            Thumbnail::Provided(image) => image,
            Thumbnail::Capture => match self.runner().capture().await {
                Ok(image) => Some(image),
                Err(err) => {
                    debug!(target: "demo-flow", %err, "thumbnail capture failed");
                    None
                }
            },
        };

        let (file_size, resolution) = request
            .video
            .as_ref()
            .map(|video| {
                (
                    video.metadata.file_size,
                    Some(video.metadata.resolution.clone()),
                )
            })
            .unwrap_or((0, None));

        let result = request.result;
        let record = DemoRecord {
            demo_name: request.demo_name,
            test_plan_id: result.test_plan_id.clone(),
            timestamp: Utc::now(),
            duration: result.duration,
            file_size,
            resolution,
            status: request.status,
            passed: result.passed,
            summary: result.summary.clone(),
            video: request.video,
            thumbnail,
            results: result.clone(),
            test_plan: request.test_plan,
        };

        match self.store.save(record).await {
            Ok(id) => {
                info!(target: "demo-flow", id = %id, "run saved");
                if let Some(callback) = &self.on_saved {
                    callback(&id);
                }
                Some(id)
            }
            Err(err) => {
                warn!(target: "demo-flow", %err, "saving run failed");
                None
            }
        }
    }
}
