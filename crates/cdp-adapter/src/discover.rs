use std::env;
use std::path::PathBuf;

use which::which;

pub const ENV_CHROME: &str = "PAGEWATCH_CHROME";
/// Set to skip the well-known install locations (PATH and the env var still apply).
pub const ENV_SKIP_OS_PATHS: &str = "PAGEWATCH_SKIP_OS_PATHS";

#[cfg(target_os = "windows")]
const BINARY_NAMES: &[&str] = &["chrome.exe", "chromium.exe", "msedge.exe"];
#[cfg(not(target_os = "windows"))]
const BINARY_NAMES: &[&str] = &[
    "google-chrome-stable",
    "google-chrome",
    "chromium",
    "chromium-browser",
];

/// Locates a Chrome/Chromium binary: `PAGEWATCH_CHROME`, then `PATH`, then well-known paths.
pub fn detect_chrome_executable() -> Option<PathBuf> {
    from_env()
        .or_else(|| BINARY_NAMES.iter().find_map(|name| which(name).ok()))
        .or_else(|| {
            if env_set(ENV_SKIP_OS_PATHS) {
                None
            } else {
                install_locations().into_iter().find(|path| path.exists())
            }
        })
}

fn from_env() -> Option<PathBuf> {
    let raw = env::var(ENV_CHROME).ok()?;
    let path = PathBuf::from(raw.trim());
    (!raw.trim().is_empty() && path.exists()).then_some(path)
}

fn env_set(key: &str) -> bool {
    env::var(key)
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false)
}

#[cfg(target_os = "windows")]
fn install_locations() -> Vec<PathBuf> {
    const SUFFIXES: &[&str] = &[
        "Google/Chrome/Application/chrome.exe",
        "Chromium/Application/chrome.exe",
        "Microsoft/Edge/Application/msedge.exe",
    ];
    ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"]
        .iter()
        .filter_map(|key| env::var(key).ok())
        .filter(|root| !root.trim().is_empty())
        .flat_map(|root| SUFFIXES.iter().map(move |suffix| PathBuf::from(&root).join(suffix)))
        .collect()
}

#[cfg(target_os = "macos")]
fn install_locations() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
        PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
    ]
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn install_locations() -> Vec<PathBuf> {
    BINARY_NAMES
        .iter()
        .map(|name| PathBuf::from("/usr/bin").join(name))
        .collect()
}
