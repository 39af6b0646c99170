use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing knobs of the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineTimings {
    /// Minimum spacing between two screenshot captures.
    pub screenshot_interval_ms: u64,
    /// Delay after a click before capturing, covers CSS/layout transitions.
    pub settle_delay_ms: u64,
    /// Bound for waiting on a load after an unplanned navigation.
    pub load_timeout_ms: u64,
    /// Bound for the DOM stability wait after history recovery.
    pub dom_stable_timeout_ms: u64,
    /// Delay used by a `wait` step without an explicit timeout.
    pub default_wait_ms: u64,
    /// Bound the driver applies to a planned navigation.
    pub navigation_timeout_ms: u64,
    /// Bound the driver applies to a history-back.
    pub history_timeout_ms: u64,
    /// Bound for the reload issued after a successful run.
    pub reload_timeout_ms: u64,
}

impl Default for EngineTimings {
    fn default() -> Self {
        Self {
            screenshot_interval_ms: 550,
            settle_delay_ms: 400,
            load_timeout_ms: 5_000,
            dom_stable_timeout_ms: 2_000,
            default_wait_ms: 1_000,
            navigation_timeout_ms: 30_000,
            history_timeout_ms: 3_000,
            reload_timeout_ms: 10_000,
        }
    }
}

impl EngineTimings {
    pub fn screenshot_interval(&self) -> Duration {
        Duration::from_millis(self.screenshot_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn dom_stable_timeout(&self) -> Duration {
        Duration::from_millis(self.dom_stable_timeout_ms)
    }

    pub fn default_wait(&self) -> Duration {
        Duration::from_millis(self.default_wait_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn history_timeout(&self) -> Duration {
        Duration::from_millis(self.history_timeout_ms)
    }

    pub fn reload_timeout(&self) -> Duration {
        Duration::from_millis(self.reload_timeout_ms)
    }
}
