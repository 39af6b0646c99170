//! Starting a local Chromium and finding its DevTools endpoint.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::async_process::Child;
use chromiumoxide::browser::BrowserConfig;
use futures::io::{AsyncBufReadExt, BufReader};
use futures::StreamExt;
use serde_json::json;
use tokio::time::timeout;
use tracing::debug;

use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};

const LAUNCH_LIMIT: Duration = Duration::from_secs(20);

const COMMON_ARGS: &[&str] = &[
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
    "--disable-component-update",
    "--disable-default-apps",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-popup-blocking",
    "--disable-sync",
    "--no-first-run",
    "--no-default-browser-check",
    "--password-store=basic",
    "--use-mock-keychain",
    "--remote-allow-origins=*",
];

const HEADLESS_ARGS: &[&str] = &["--headless=new", "--hide-scrollbars", "--mute-audio"];

/// Spawns Chromium and returns the child together with its browser websocket URL.
pub(crate) async fn launch(cfg: &CdpConfig) -> Result<(Child, String), AdapterError> {
    let mut child = browser_config(cfg)?
        .launch()
        .map_err(|err| AdapterError::internal(format!("failed to launch chromium: {err}")))?;
    let url = read_ws_url(&mut child).await?;
    debug!(target: "cdp-transport", %url, "chromium is listening");
    Ok((child, url))
}

fn browser_config(cfg: &CdpConfig) -> Result<BrowserConfig, AdapterError> {
    let explicit = !cfg.executable.as_os_str().is_empty();
    if explicit && !cfg.executable.exists() {
        return Err(AdapterError::new(AdapterErrorKind::CdpIo)
            .with_hint(format!(
                "chrome executable not found at {}",
                cfg.executable.display()
            ))
            .with_data(json!({
                "expected": cfg.executable,
                "hint": "Set PAGEWATCH_CHROME to the full path of chrome/chromium."
            })));
    }

    let profile = profile_dir(cfg)?;
    let mut args: Vec<&str> = COMMON_ARGS.to_vec();
    if cfg.headless {
        args.extend_from_slice(HEADLESS_ARGS);
    }

    let mut builder = BrowserConfig::builder()
        .request_timeout(Duration::from_millis(cfg.default_deadline_ms))
        .launch_timeout(LAUNCH_LIMIT)
        .window_size(cfg.window_width, cfg.window_height)
        .user_data_dir(profile)
        .args(args);
    if !cfg.headless {
        builder = builder.with_head();
    }
    if sandbox_disabled() {
        builder = builder.no_sandbox();
    }
    if explicit {
        builder = builder.chrome_executable(cfg.executable.clone());
    }
    builder
        .build()
        .map_err(|err| AdapterError::internal(format!("browser config error: {err}")))
}

fn profile_dir(cfg: &CdpConfig) -> Result<PathBuf, AdapterError> {
    let dir = if cfg.user_data_dir.is_absolute() {
        cfg.user_data_dir.clone()
    } else {
        env::current_dir()
            .map_err(|err| AdapterError::internal(format!("cannot resolve cwd: {err}")))?
            .join(&cfg.user_data_dir)
    };
    fs::create_dir_all(&dir)
        .map_err(|err| AdapterError::internal(format!("cannot create {}: {err}", dir.display())))?;
    Ok(dir)
}

fn sandbox_disabled() -> bool {
    env::var("PAGEWATCH_DISABLE_SANDBOX")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Scans stderr for the `DevTools listening on ws://...` banner.
async fn read_ws_url(child: &mut Child) -> Result<String, AdapterError> {
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AdapterError::internal("chromium process missing stderr handle"))?;
    let mut lines = BufReader::new(stderr).lines();
    let mut seen = Vec::new();

    let scan = async {
        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(err) => return Err(AdapterError::io(err.to_string())),
            };
            if let Some(url) = parse_listening_line(&line) {
                return Ok(url);
            }
            if seen.len() < 8 {
                seen.push(line);
            }
        }
        Err(AdapterError::io(format!(
            "chromium exited before announcing its devtools url; stderr: {}",
            seen.join(" | ")
        )))
    };

    timeout(LAUNCH_LIMIT, scan)
        .await
        .map_err(|_| AdapterError::io("timed out waiting for the devtools url"))?
}

/// Returns the websocket URL of a `DevTools listening on ws://...` line.
pub(crate) fn parse_listening_line(line: &str) -> Option<String> {
    let (_, ws) = line.rsplit_once("listening on ")?;
    let ws = ws.trim();
    (ws.starts_with("ws") && ws.contains("devtools/browser")).then(|| ws.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_devtools_banner() {
        let line = "DevTools listening on ws://127.0.0.1:40123/devtools/browser/5b1c";
        assert_eq!(
            parse_listening_line(line).as_deref(),
            Some("ws://127.0.0.1:40123/devtools/browser/5b1c")
        );
        assert_eq!(parse_listening_line("[0101/000000.1:ERROR] gpu"), None);
        assert_eq!(
            parse_listening_line("listening on ws://host/devtools/page/1"),
            None
        );
    }

    #[test]
    fn missing_executable_is_reported() {
        let cfg = CdpConfig {
            executable: PathBuf::from("/nonexistent/pagewatch-chrome"),
            ..CdpConfig::default()
        };
        let err = browser_config(&cfg).unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::CdpIo);
        assert!(err.data.is_some());
    }
}
