//! Scripted collaborators for driving the engine without a browser.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use demo_flow::{
    ActionExecutor, CaptureOutput, CaptureSubsystem, DemoEngine, EngineTimings, PortError,
    ResultStore, TargetDriver,
};
use pagewatch_core_types::{
    Action, DemoRecord, LoadOutcome, StepResult, TestStep, NEEDS_BACKGROUND_SCREENSHOT,
};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::Instant;

pub const PIXELS: &str = "data:image/png;base64,iVBORw0KGgo=";

/// Browser-side state both fakes act on.
#[derive(Debug, Default)]
pub struct Page {
    pub location: String,
    pub history: Vec<String>,
    pub calls: Vec<String>,
    pub captures: Vec<Instant>,
    pub batches: Vec<Vec<String>>,
    /// Whether the in-page executor is installed in the current document.
    pub executor_installed: bool,
}

impl Page {
    pub fn visit(&mut self, url: &str) {
        let previous = std::mem::replace(&mut self.location, url.to_string());
        if !previous.is_empty() {
            self.history.push(previous);
        }
        self.executor_installed = false;
    }
}

pub type SharedPage = Arc<Mutex<Page>>;

pub struct ScriptedDriver {
    pub page: SharedPage,
    pub fail_capture: bool,
    /// Location history-back lands on instead of the real previous entry.
    pub back_lands_on: Option<String>,
    pub fail_inject: bool,
    /// Reading the location fails while the page sits on this URL.
    pub location_fails_at: Option<String>,
}

impl ScriptedDriver {
    pub fn new(page: SharedPage) -> Self {
        Self {
            page,
            fail_capture: false,
            back_lands_on: None,
            fail_inject: false,
            location_fails_at: None,
        }
    }
}

#[async_trait]
impl TargetDriver for ScriptedDriver {
    fn target_id(&self) -> String {
        "target-1".to_string()
    }

    async fn navigate(&self, url: &str) -> Result<LoadOutcome, PortError> {
        let mut page = self.page.lock();
        page.calls.push(format!("navigate {url}"));
        page.visit(url);
        Ok(LoadOutcome::Completed)
    }

    async fn go_back(&self) -> Result<LoadOutcome, PortError> {
        let mut page = self.page.lock();
        page.calls.push("go_back".to_string());
        let destination = match &self.back_lands_on {
            Some(forced) => Some(forced.clone()),
            None => page.history.pop(),
        };
        if let Some(url) = destination {
            page.location = url;
        }
        Ok(LoadOutcome::Completed)
    }

    async fn reload(&self) -> Result<LoadOutcome, PortError> {
        self.page.lock().calls.push("reload".to_string());
        Ok(LoadOutcome::Completed)
    }

    async fn wait_for_load(&self, _timeout: Duration) -> LoadOutcome {
        self.page.lock().calls.push("wait_for_load".to_string());
        LoadOutcome::TimedOut
    }

    async fn capture_screenshot(&self) -> Result<String, PortError> {
        let mut page = self.page.lock();
        page.calls.push("screenshot".to_string());
        if self.fail_capture {
            return Err(PortError::Driver("capture refused".into()));
        }
        page.captures.push(Instant::now());
        Ok(PIXELS.to_string())
    }

    async fn inject_executor(&self) -> Result<(), PortError> {
        let mut page = self.page.lock();
        page.calls.push("inject".to_string());
        if self.fail_inject {
            return Err(PortError::Driver("script blocked by csp".into()));
        }
        page.executor_installed = true;
        Ok(())
    }

    async fn focus_target(&self) -> Result<(), PortError> {
        self.page.lock().calls.push("focus".to_string());
        Ok(())
    }

    async fn current_location(&self) -> Result<String, PortError> {
        let mut page = self.page.lock();
        page.calls.push("location".to_string());
        if self.location_fails_at.as_deref() == Some(page.location.as_str()) {
            return Err(PortError::Driver("target crashed".into()));
        }
        Ok(page.location.clone())
    }
}

pub type Responder = Box<dyn Fn(&TestStep, &mut Page) -> Result<StepResult, PortError> + Send + Sync>;

pub struct ScriptedExecutor {
    pub page: SharedPage,
    responder: Responder,
    /// Only answers pings once the driver injected it into the current document.
    pub needs_injection: bool,
}

impl ScriptedExecutor {
    pub fn new(page: SharedPage) -> Self {
        Self::with_responder(page, |step, _| Ok(default_response(step)))
    }

    pub fn with_responder<F>(page: SharedPage, responder: F) -> Self
    where
        F: Fn(&TestStep, &mut Page) -> Result<StepResult, PortError> + Send + Sync + 'static,
    {
        Self {
            page,
            responder: Box::new(responder),
            needs_injection: false,
        }
    }
}

/// Passes every step; screenshots ask the engine to capture pixels.
pub fn default_response(step: &TestStep) -> StepResult {
    let result = StepResult::passed(step.step_number, step.kind(), &step.description);
    if step.action.is_screenshot() {
        result.with_metadata(NEEDS_BACKGROUND_SCREENSHOT, Value::Bool(true))
    } else {
        result
    }
}

#[async_trait]
impl ActionExecutor for ScriptedExecutor {
    async fn ping(&self) -> bool {
        let mut page = self.page.lock();
        page.calls.push("ping".to_string());
        !self.needs_injection || page.executor_installed
    }

    async fn execute_plan(&self, steps: &[TestStep]) -> Result<Vec<StepResult>, PortError> {
        let mut page = self.page.lock();
        page.batches
            .push(steps.iter().map(|step| step.kind().to_string()).collect());
        let mut results = Vec::with_capacity(steps.len());
        for step in steps {
            let result = (self.responder)(step, &mut *page)?;
            let critical = !result.passed && !matches!(step.action, Action::Assert { .. });
            results.push(result);
            if critical {
                break;
            }
        }
        Ok(results)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub records: Mutex<Vec<DemoRecord>>,
    pub fail: bool,
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn init(&self) -> Result<(), PortError> {
        Ok(())
    }

    async fn save(&self, record: DemoRecord) -> Result<String, PortError> {
        if self.fail {
            return Err(PortError::Store("disk full".into()));
        }
        let mut records = self.records.lock();
        records.push(record);
        Ok(format!("run-{}", records.len()))
    }
}

#[derive(Default)]
pub struct FakeCapture {
    pub start_error: Option<String>,
    pub payload: Vec<u8>,
}

#[async_trait]
impl CaptureSubsystem for FakeCapture {
    async fn start(&self, _target_id: &str) -> Result<(), PortError> {
        match &self.start_error {
            Some(message) => Err(PortError::Capture(message.clone())),
            None => Ok(()),
        }
    }

    async fn stop(&self) -> Result<CaptureOutput, PortError> {
        Ok(CaptureOutput {
            data: self.payload.clone(),
            mime_type: "video/x-motion-jpeg".to_string(),
            resolution: Some("1280x720".to_string()),
        })
    }

    async fn release(&self) {}
}

pub struct Harness {
    pub page: SharedPage,
    pub store: Arc<MemoryStore>,
    pub engine: DemoEngine,
}

pub fn harness(driver: ScriptedDriver, executor: ScriptedExecutor) -> Harness {
    harness_with_store(driver, executor, MemoryStore::default())
}

pub fn harness_with_store(
    driver: ScriptedDriver,
    executor: ScriptedExecutor,
    store: MemoryStore,
) -> Harness {
    let page = driver.page.clone();
    let store = Arc::new(store);
    let engine = DemoEngine::new(
        Arc::new(driver),
        Arc::new(executor),
        store.clone(),
        EngineTimings::default(),
    );
    Harness {
        page,
        store,
        engine,
    }
}

pub fn shared_page(location: &str) -> SharedPage {
    Arc::new(Mutex::new(Page {
        location: location.to_string(),
        ..Default::default()
    }))
}

pub fn step(number: u32, action: Action) -> TestStep {
    TestStep::new(number, format!("step {number}"), action)
}

pub fn click(number: u32, selector: &str) -> TestStep {
    step(
        number,
        Action::Click {
            selector: selector.to_string(),
            selector_fallback: None,
        },
    )
}

pub fn screenshot(number: u32) -> TestStep {
    step(number, Action::Screenshot { target: None })
}

pub fn navigate(number: u32, url: &str) -> TestStep {
    step(
        number,
        Action::Navigate {
            target: url.to_string(),
        },
    )
}

pub fn wait(number: u32) -> TestStep {
    step(
        number,
        Action::Wait {
            timeout: Some(50),
            condition: None,
            selector: None,
        },
    )
}
