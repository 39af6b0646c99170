use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use cdp_adapter::{AdapterError, CdpAdapter};
use demo_flow::{EngineTimings, PortError, TargetDriver};
use pagewatch_core_types::LoadOutcome;
use tracing::debug;

use super::executor::PRESENCE_PROBE;

/// [`TargetDriver`] over one attached page.
pub struct CdpDriver {
    adapter: Arc<CdpAdapter>,
    timings: EngineTimings,
    executor_script: Option<String>,
}

impl CdpDriver {
    pub fn new(adapter: Arc<CdpAdapter>, timings: EngineTimings) -> Self {
        Self {
            adapter,
            timings,
            executor_script: None,
        }
    }

    /// Source evaluated by `inject_executor` to install the in-page executor.
    pub fn with_executor_script(mut self, script: String) -> Self {
        self.executor_script = Some(script);
        self
    }
}

fn driver_err(err: AdapterError) -> PortError {
    PortError::Driver(err.to_string())
}

#[async_trait]
impl TargetDriver for CdpDriver {
    fn target_id(&self) -> String {
        self.adapter.target_id().unwrap_or_default()
    }

    async fn navigate(&self, url: &str) -> Result<LoadOutcome, PortError> {
        self.adapter
            .navigate(url, self.timings.navigation_timeout())
            .await
            .map_err(driver_err)
    }

    async fn go_back(&self) -> Result<LoadOutcome, PortError> {
        self.adapter
            .go_back(self.timings.history_timeout())
            .await
            .map_err(driver_err)
    }

    async fn reload(&self) -> Result<LoadOutcome, PortError> {
        self.adapter
            .reload(self.timings.reload_timeout())
            .await
            .map_err(driver_err)
    }

    async fn wait_for_load(&self, timeout: Duration) -> LoadOutcome {
        self.adapter.wait_ready(timeout).await
    }

    async fn capture_screenshot(&self) -> Result<String, PortError> {
        let png = self.adapter.screenshot().await.map_err(driver_err)?;
        Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
    }

    async fn inject_executor(&self) -> Result<(), PortError> {
        if let Some(script) = &self.executor_script {
            debug!(target: "bridge", bytes = script.len(), "injecting executor script");
            self.adapter.evaluate(script).await.map_err(driver_err)?;
        }
        let present = self
            .adapter
            .evaluate(PRESENCE_PROBE)
            .await
            .map_err(driver_err)?;
        if present.as_bool() == Some(true) {
            Ok(())
        } else {
            Err(PortError::Driver(
                "in-page executor is not installed on this page".to_string(),
            ))
        }
    }

    async fn focus_target(&self) -> Result<(), PortError> {
        self.adapter.bring_to_front().await.map_err(driver_err)
    }

    async fn current_location(&self) -> Result<String, PortError> {
        self.adapter.current_url().await.map_err(driver_err)
    }
}
