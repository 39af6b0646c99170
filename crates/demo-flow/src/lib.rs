//! Demo and exploration execution engine.
//!
//! Sequences abstract actions into rounds, drives them through a target driver and an in-page
//! action executor, captures evidence, recovers from navigation and modal side effects, and
//! hands a structured result to a persistent store.

pub mod config;
pub mod errors;
pub mod explore;
pub mod orchestrator;
mod persist;
pub mod planner;
pub mod ports;
pub mod recording;
pub mod runner;
pub mod throttle;
pub mod types;

pub use config::EngineTimings;
pub use errors::FlowError;
pub use orchestrator::{DemoEngine, SavedCallback};
pub use planner::{group_step_rounds, Round};
pub use ports::{ActionExecutor, CaptureOutput, CaptureSubsystem, PortError, ResultStore, TargetDriver};
pub use recording::{RecordingError, RecordingSession, RecordingState};
pub use runner::RoundRunner;
pub use throttle::ScreenshotThrottle;
pub use types::{RunContext, RunOptions};
