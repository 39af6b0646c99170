//! Adapters from the browser and store crates to the engine's collaborator ports.

mod capture;
mod driver;
mod executor;
mod store;

pub use capture::ScreencastCapture;
pub use driver::CdpDriver;
pub use executor::{PageExecutor, EXECUTOR_GLOBAL};
pub use store::StoreBridge;
