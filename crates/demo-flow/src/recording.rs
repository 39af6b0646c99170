//! Recording session state machine around a capture subsystem.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use pagewatch_core_types::{RecordingArtifact, VideoMetadata};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::ports::CaptureSubsystem;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
    Stopped,
    Error,
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RecordingState::Idle => "idle",
            RecordingState::Recording => "recording",
            RecordingState::Stopped => "stopped",
            RecordingState::Error => "error",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, Error)]
pub enum RecordingError {
    #[error("cannot {op} recording while {state}")]
    InvalidState {
        op: &'static str,
        state: RecordingState,
    },
    #[error("recording start failed: {0}")]
    StartFailed(String),
    #[error("recording stop failed: {0}")]
    StopFailed(String),
}

pub struct RecordingSession {
    capture: Arc<dyn CaptureSubsystem>,
    state: RecordingState,
    started_at: Option<Instant>,
}

impl RecordingSession {
    pub fn new(capture: Arc<dyn CaptureSubsystem>) -> Self {
        Self {
            capture,
            state: RecordingState::Idle,
            started_at: None,
        }
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }

    pub async fn start(&mut self, target_id: &str) -> Result<(), RecordingError> {
        if self.state != RecordingState::Idle {
            return Err(RecordingError::InvalidState {
                op: "start",
                state: self.state,
            });
        }
        match self.capture.start(target_id).await {
            Ok(()) => {
                debug!(target: "demo-flow", target_id, "recording started");
                self.state = RecordingState::Recording;
                self.started_at = Some(Instant::now());
                Ok(())
            }
            Err(err) => {
                self.state = RecordingState::Error;
                Err(RecordingError::StartFailed(err.to_string()))
            }
        }
    }

    /// Finalizes the capture. The returned artifact may be empty; callers decide what to keep.
    pub async fn stop(&mut self) -> Result<RecordingArtifact, RecordingError> {
        if self.state != RecordingState::Recording {
            return Err(RecordingError::InvalidState {
                op: "stop",
                state: self.state,
            });
        }
        let output = match self.capture.stop().await {
            Ok(output) => output,
            Err(err) => {
                self.state = RecordingState::Error;
                return Err(RecordingError::StopFailed(err.to_string()));
            }
        };
        let elapsed = self
            .started_at
            .take()
            .map(|at| at.elapsed())
            .unwrap_or_default();
        self.state = RecordingState::Stopped;

        let timestamp = Utc::now();
        let mime_type = if output.mime_type.is_empty() {
            "video/webm".to_string()
        } else {
            output.mime_type
        };
        let filename = format!(
            "pagewatch-{}.{}",
            timestamp.format("%Y%m%d-%H%M%S"),
            extension_for(&mime_type)
        );
        let metadata = VideoMetadata {
            duration: elapsed.as_millis() as u64,
            file_size: output.data.len() as u64,
            resolution: output.resolution.unwrap_or_else(|| "unknown".to_string()),
            mime_type,
            timestamp,
            filename,
        };
        debug!(
            target: "demo-flow",
            bytes = metadata.file_size,
            duration_ms = metadata.duration,
            "recording stopped"
        );
        Ok(RecordingArtifact {
            data: output.data,
            metadata,
        })
    }

    /// Releases the subsystem and returns to `Idle`. Legal from any state.
    pub async fn reset(&mut self) {
        if self.state == RecordingState::Recording {
            warn!(target: "demo-flow", "resetting an active recording");
        }
        self.capture.release().await;
        self.state = RecordingState::Idle;
        self.started_at = None;
    }
}

/// File extension for a capture MIME type.
pub fn extension_for(mime_type: &str) -> &'static str {
    let base = mime_type.split(';').next().unwrap_or_default().trim();
    match base {
        "video/webm" => "webm",
        "video/mp4" => "mp4",
        "video/x-motion-jpeg" => "mjpeg",
        _ => "bin",
    }
}
