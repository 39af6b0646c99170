use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::detect_chrome_executable;

/// Configuration for launching and driving the browser.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CdpConfig {
    pub executable: PathBuf,
    pub user_data_dir: PathBuf,
    pub headless: bool,
    /// Upper bound for a single protocol command.
    pub default_deadline_ms: u64,
    /// Attach to an already running browser instead of launching one.
    pub websocket_url: Option<String>,
    pub heartbeat_interval_ms: u64,
    pub window_width: u32,
    pub window_height: u32,
    /// JPEG quality of screencast frames.
    pub screencast_quality: u8,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            executable: default_chrome_path(),
            user_data_dir: default_profile_dir(),
            headless: resolve_headless_default(),
            default_deadline_ms: 30_000,
            websocket_url: None,
            heartbeat_interval_ms: 15_000,
            window_width: 1280,
            window_height: 720,
            screencast_quality: 70,
        }
    }
}

fn resolve_headless_default() -> bool {
    // "0", "false", "no", "off" mean headful
    match env::var("PAGEWATCH_HEADLESS") {
        Ok(value) => {
            let lower = value.to_ascii_lowercase();
            !matches!(lower.as_str(), "0" | "false" | "no" | "off")
        }
        Err(_) => true,
    }
}

fn default_chrome_path() -> PathBuf {
    detect_chrome_executable().unwrap_or_default()
}

fn default_profile_dir() -> PathBuf {
    if let Ok(path) = env::var("PAGEWATCH_CHROME_PROFILE") {
        return PathBuf::from(path);
    }
    Path::new("./.pagewatch-profile").into()
}
