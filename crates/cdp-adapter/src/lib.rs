//! Chromium DevTools Protocol adapter.
//!
//! [`ChromiumTransport`] owns the browser process and the websocket connection; [`CdpAdapter`]
//! drives one page target on top of it: navigation with load-event waiting, history, reload,
//! screenshots, script evaluation and screencast capture.

pub mod config;
mod discover;
pub mod error;
mod launch;
pub mod metrics;
pub mod page;
pub mod screencast;
pub mod transport;

pub use config::CdpConfig;
pub use discover::detect_chrome_executable;
pub use error::{AdapterError, AdapterErrorKind};
pub use metrics::AdapterMetricsSnapshot;
pub use page::{CdpAdapter, PageSession};
pub use screencast::{ScreencastFrame, ScreencastRecording, MJPEG_MIME};
pub use transport::{CdpTransport, ChromiumTransport, CommandTarget, TransportEvent};
