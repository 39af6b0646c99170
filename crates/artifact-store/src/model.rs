//! On-disk shapes. Binary payloads are stored next to the record and referenced by file name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pagewatch_core_types::{DemoResult, RunStatus, TestPlan};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub file: String,
    pub mime_type: String,
    pub bytes: u64,
}

/// `record.json` of one run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRun {
    pub id: String,
    pub demo_name: String,
    pub test_plan_id: String,
    pub timestamp: DateTime<Utc>,
    pub duration: u64,
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    pub status: RunStatus,
    pub passed: bool,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<StoredFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<StoredFile>,
    pub results: DemoResult,
    pub test_plan: TestPlan,
}

/// Listing entry.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub id: String,
    pub demo_name: String,
    pub timestamp: DateTime<Utc>,
    pub status: RunStatus,
    pub passed: bool,
    pub summary: String,
    pub has_video: bool,
}

impl From<&StoredRun> for RunSummary {
    fn from(run: &StoredRun) -> Self {
        Self {
            id: run.id.clone(),
            demo_name: run.demo_name.clone(),
            timestamp: run.timestamp,
            status: run.status,
            passed: run.passed,
            summary: run.summary.clone(),
            has_video: run.video.is_some(),
        }
    }
}
