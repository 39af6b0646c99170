//! Application configuration.
//!
//! Loaded from YAML; every section is optional and falls back to defaults. A handful of
//! environment variables override the file.

use std::env;
use std::path::PathBuf;

use cdp_adapter::CdpConfig;
use demo_flow::EngineTimings;
use serde::{Deserialize, Serialize};

pub const ENV_CHROME: &str = "PAGEWATCH_CHROME";
pub const ENV_HEADLESS: &str = "PAGEWATCH_HEADLESS";
pub const ENV_STORE: &str = "PAGEWATCH_STORE";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: CdpConfig,
    pub engine: EngineConfig,
    pub executor: ExecutorConfig,
    pub store: StoreConfig,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    #[serde(flatten)]
    pub timings: EngineTimings,
    /// Whether runs record video unless the command line says otherwise.
    pub record_video: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timings: EngineTimings::default(),
            record_video: true,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Script that installs the in-page executor. When absent the page must already carry one.
    pub script_path: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub root: PathBuf,
    /// Runs older than this are swept at startup. Zero keeps everything.
    pub retention_days: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_store_root(),
            retention_days: 30,
        }
    }
}

fn default_store_root() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("pagewatch"))
        .unwrap_or_else(|| PathBuf::from("./pagewatch-data"))
}

impl Config {
    /// Applies `PAGEWATCH_*` overrides on top of whatever the file said.
    pub fn apply_env_overrides(&mut self) {
        if let Some(chrome) = non_empty_env(ENV_CHROME) {
            self.browser.executable = PathBuf::from(chrome);
        }
        if let Some(headless) = non_empty_env(ENV_HEADLESS) {
            self.browser.headless = parse_flag(&headless);
        }
        if let Some(root) = non_empty_env(ENV_STORE) {
            self.store.root = PathBuf::from(root);
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}
