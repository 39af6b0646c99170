//! Shared data model for the pagewatch engine.
//!
//! Everything here is plain data: plans and steps supplied by callers, the results reported by
//! the driver and the in-page executor, and the record handed to the persistent store.

mod explore;
pub mod location;
mod record;
mod result;
mod step;

pub use explore::{ExplorationMode, ExplorationPlan, ExplorationTarget};
pub use record::{
    DemoRecord, LoadOutcome, RecordingArtifact, RunStatus, TestPlan, VideoMetadata,
};
pub use result::{
    ClickEffects, DemoResult, ModalInfo, ScreenshotCapture, StepResult, DISMISSED,
    MODAL_DETECTED, NEEDS_BACKGROUND_SCREENSHOT, SCREENSHOT_DATA_URL, URL_CHANGED,
};
pub use step::{Action, AssertionType, TestStep, ENGINE_STEP};
