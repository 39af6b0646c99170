//! Per-run options and the context threaded through the call chain.

use crate::config::EngineTimings;
use crate::throttle::ScreenshotThrottle;

/// Caller-supplied options for one run.
#[derive(Clone, Debug)]
pub struct RunOptions {
    /// False when no capture is permitted this run (e.g. no interactive trigger was available).
    pub allow_recording: bool,
    /// Name stored with the persisted record; derived from the plan when absent.
    pub demo_name: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            allow_recording: true,
            demo_name: None,
        }
    }
}

impl RunOptions {
    pub fn without_recording(mut self) -> Self {
        self.allow_recording = false;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.demo_name = Some(name.into());
        self
    }
}

/// State shared by every step of the runs an engine performs.
#[derive(Clone, Debug)]
pub struct RunContext {
    pub throttle: ScreenshotThrottle,
    pub timings: EngineTimings,
}

impl RunContext {
    pub fn new(timings: EngineTimings) -> Self {
        Self {
            throttle: ScreenshotThrottle::new(timings.screenshot_interval()),
            timings,
        }
    }
}
