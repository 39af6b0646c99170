//! Step outcomes and the aggregated run result.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::record::VideoMetadata;

/// Metadata marker: the executor could not capture pixels and the orchestrator must.
pub const NEEDS_BACKGROUND_SCREENSHOT: &str = "needsBackgroundScreenshot";
/// Metadata mirror of `screenshotDataUrl`.
pub const SCREENSHOT_DATA_URL: &str = "screenshotDataUrl";
/// Click effect: the location changed after the click.
pub const URL_CHANGED: &str = "urlChanged";
/// Click effect: a modal surfaced after the click (object or null).
pub const MODAL_DETECTED: &str = "modalDetected";
/// Modal dismissal reported an actual effect.
pub const DISMISSED: &str = "dismissed";

/// Outcome of one action, produced by the driver or by the in-page executor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step_number: u32,
    pub action: String,
    #[serde(default)]
    pub description: String,
    pub passed: bool,
    /// Milliseconds.
    #[serde(default)]
    pub duration: u64,
    #[serde(default = "Utc::now", with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_data_url: Option<String>,
}

impl StepResult {
    pub fn passed(step_number: u32, action: &str, description: impl Into<String>) -> Self {
        Self {
            step_number,
            action: action.to_string(),
            description: description.into(),
            passed: true,
            duration: 0,
            timestamp: Utc::now(),
            error: None,
            metadata: None,
            screenshot_data_url: None,
        }
    }

    pub fn failed(
        step_number: u32,
        action: &str,
        description: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        let mut result = Self::passed(step_number, action, description);
        result.passed = false;
        result.error = Some(error.into());
        result
    }

    pub fn with_duration(mut self, elapsed: Duration) -> Self {
        self.duration = elapsed.as_millis() as u64;
        self
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value);
        self
    }

    /// Marks the step failed, keeping any error it already carried.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.passed = false;
        let error = error.into();
        self.error = Some(match self.error.take() {
            Some(previous) => format!("{previous}; {error}"),
            None => error,
        });
    }

    fn meta(&self, key: &str) -> Option<&Value> {
        self.metadata.as_ref().and_then(|map| map.get(key))
    }

    pub fn needs_background_screenshot(&self) -> bool {
        self.meta(NEEDS_BACKGROUND_SCREENSHOT)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn clear_background_screenshot(&mut self) {
        if let Some(map) = self.metadata.as_mut() {
            map.remove(NEEDS_BACKGROUND_SCREENSHOT);
        }
    }

    /// Attaches captured pixels to the result and mirrors them into the metadata.
    pub fn attach_screenshot(&mut self, data_url: String) {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(SCREENSHOT_DATA_URL.to_string(), Value::String(data_url.clone()));
        self.screenshot_data_url = Some(data_url);
    }

    pub fn click_effects(&self) -> ClickEffects {
        let url_changed = self
            .meta(URL_CHANGED)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let modal = self
            .meta(MODAL_DETECTED)
            .filter(|value| !value.is_null())
            .and_then(|value| match value {
                Value::Bool(true) => Some(ModalInfo::default()),
                Value::Bool(false) => None,
                other => serde_json::from_value::<ModalInfo>(other.clone()).ok(),
            });
        ClickEffects { url_changed, modal }
    }

    /// True when a modal dismissal actually changed something on the page.
    pub fn reported_effect(&self) -> bool {
        self.passed && self.meta(DISMISSED).and_then(Value::as_bool).unwrap_or(false)
    }
}

/// Side effects the executor observed after a click.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClickEffects {
    pub url_changed: bool,
    pub modal: Option<ModalInfo>,
}

/// Descriptor of a modal dialog surfaced by an action.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModalInfo {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dismiss_hint: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotCapture {
    pub step_number: u32,
    pub data_url: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub label: String,
}

/// Aggregated result of one run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoResult {
    pub test_plan_id: String,
    pub passed: bool,
    pub steps: Vec<StepResult>,
    pub screenshots: Vec<ScreenshotCapture>,
    /// Milliseconds.
    pub duration: u64,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_metadata: Option<VideoMetadata>,
}

impl DemoResult {
    /// Builds the result from the collected steps. `passed` is the AND of every step.
    pub fn from_steps(
        test_plan_id: impl Into<String>,
        steps: Vec<StepResult>,
        elapsed: Duration,
        aborted: Option<&str>,
    ) -> Self {
        let total = steps.len();
        let ok = steps.iter().filter(|step| step.passed).count();
        let mut summary = format!("{ok}/{total} steps passed");
        if let Some(reason) = aborted {
            summary.push_str("; run aborted: ");
            summary.push_str(reason);
        }
        let screenshots = steps
            .iter()
            .filter_map(|step| {
                step.screenshot_data_url
                    .as_ref()
                    .map(|data_url| ScreenshotCapture {
                        step_number: step.step_number,
                        data_url: data_url.clone(),
                        timestamp: step.timestamp,
                        label: step.description.clone(),
                    })
            })
            .collect();
        Self {
            test_plan_id: test_plan_id.into(),
            passed: ok == total && aborted.is_none(),
            steps,
            screenshots,
            duration: elapsed.as_millis() as u64,
            summary,
            video_metadata: None,
        }
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepResult> {
        self.steps.iter().filter(|step| !step.passed)
    }
}
