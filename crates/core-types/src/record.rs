//! Records handed to the persistent store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::result::DemoResult;
use crate::step::TestStep;

/// A fixed action plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestPlan {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub steps: Vec<TestStep>,
}

/// Metadata of a finished recording.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    /// Milliseconds.
    pub duration: u64,
    pub file_size: u64,
    pub resolution: String,
    pub mime_type: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub filename: String,
}

/// Binary recording plus its metadata. The payload never goes through serde.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordingArtifact {
    pub data: Vec<u8>,
    pub metadata: VideoMetadata,
}

impl RecordingArtifact {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() || self.metadata.file_size == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Complete,
    Error,
}

/// Everything the store persists for one run.
#[derive(Clone, Debug, PartialEq)]
pub struct DemoRecord {
    pub demo_name: String,
    pub test_plan_id: String,
    pub timestamp: DateTime<Utc>,
    /// Milliseconds.
    pub duration: u64,
    pub file_size: u64,
    pub resolution: Option<String>,
    pub status: RunStatus,
    pub passed: bool,
    pub summary: String,
    pub video: Option<RecordingArtifact>,
    /// Data URL of the thumbnail image.
    pub thumbnail: Option<String>,
    pub results: DemoResult,
    pub test_plan: TestPlan,
}

/// Outcome of a bounded wait on the target. A timeout is a valid outcome, not a failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    Completed,
    TimedOut,
    Failed(String),
}

impl LoadOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, LoadOutcome::Completed)
    }
}
