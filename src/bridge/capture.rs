use std::sync::Arc;

use async_trait::async_trait;
use cdp_adapter::{CdpAdapter, MJPEG_MIME};
use demo_flow::{CaptureOutput, CaptureSubsystem, PortError};
use tracing::debug;

/// Video capture backed by the page screencast. Frames are muxed into Motion JPEG on stop.
pub struct ScreencastCapture {
    adapter: Arc<CdpAdapter>,
}

impl ScreencastCapture {
    pub fn new(adapter: Arc<CdpAdapter>) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl CaptureSubsystem for ScreencastCapture {
    async fn start(&self, target_id: &str) -> Result<(), PortError> {
        if self.adapter.target_id().as_deref() != Some(target_id) {
            return Err(PortError::Capture(format!(
                "target {target_id} is not the attached page"
            )));
        }
        self.adapter
            .start_screencast()
            .await
            .map_err(|err| PortError::Capture(err.to_string()))
    }

    async fn stop(&self) -> Result<CaptureOutput, PortError> {
        let recording = self
            .adapter
            .stop_screencast()
            .await
            .map_err(|err| PortError::Capture(err.to_string()))?;
        debug!(
            target: "bridge",
            frames = recording.frames.len(),
            span_ms = recording.span_ms(),
            "screencast stopped"
        );
        Ok(CaptureOutput {
            data: recording.to_mjpeg(),
            mime_type: MJPEG_MIME.to_string(),
            resolution: recording.resolution(),
        })
    }

    async fn release(&self) {
        self.adapter.discard_screencast().await;
        debug!(target: "bridge", "screencast released");
    }
}
