//! Collaborators the engine drives. Concrete implementations live outside this crate.

use std::time::Duration;

use async_trait::async_trait;
use pagewatch_core_types::{DemoRecord, LoadOutcome, StepResult, TestStep};
use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum PortError {
    #[error("driver failure: {0}")]
    Driver(String),
    #[error("executor failure: {0}")]
    Executor(String),
    #[error("capture failure: {0}")]
    Capture(String),
    #[error("store failure: {0}")]
    Store(String),
}

/// Controls the target from outside its script context.
#[async_trait]
pub trait TargetDriver: Send + Sync {
    /// Identifier handed to the capture subsystem.
    fn target_id(&self) -> String;

    /// Skips when already at the normalized URL, otherwise loads it and waits for completion.
    async fn navigate(&self, url: &str) -> Result<LoadOutcome, PortError>;

    /// History back. A load that never signals completion resolves as `TimedOut`.
    async fn go_back(&self) -> Result<LoadOutcome, PortError>;

    async fn reload(&self) -> Result<LoadOutcome, PortError>;

    /// Bounded wait for a quiescent/loaded state. Never fails on timeout.
    async fn wait_for_load(&self, timeout: Duration) -> LoadOutcome;

    /// Captures the visible area and returns it as a data URL.
    async fn capture_screenshot(&self) -> Result<String, PortError>;

    async fn inject_executor(&self) -> Result<(), PortError>;

    async fn focus_target(&self) -> Result<(), PortError>;

    async fn current_location(&self) -> Result<String, PortError>;
}

/// The in-page agent performing fine-grained actions.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Liveness probe; `false` when nothing answers.
    async fn ping(&self) -> bool;

    /// Runs a batch and returns one result per executed step. The executor may stop early on a
    /// critical failure, in which case fewer results come back.
    async fn execute_plan(&self, steps: &[TestStep]) -> Result<Vec<StepResult>, PortError>;
}

/// Raw output of the capture subsystem.
#[derive(Clone, Debug, Default)]
pub struct CaptureOutput {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub resolution: Option<String>,
}

/// Video capture of the target.
#[async_trait]
pub trait CaptureSubsystem: Send + Sync {
    async fn start(&self, target_id: &str) -> Result<(), PortError>;
    async fn stop(&self) -> Result<CaptureOutput, PortError>;
    /// Releases whatever the subsystem still holds. Must be safe to call in any state.
    async fn release(&self);
}

#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn init(&self) -> Result<(), PortError>;
    /// Persists the record and returns its id. Binary payloads move into the store.
    async fn save(&self, record: DemoRecord) -> Result<String, PortError>;
}
