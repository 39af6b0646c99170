use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

const LOCAL_CONFIG: &str = "config/pagewatch.yaml";

/// Installs the global subscriber. `RUST_LOG` wins over `level`; `debug` forces DEBUG.
pub fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("Failed to install the tracing subscriber")?;

    Ok(())
}

pub struct LoadedConfig {
    pub config: Config,
    pub path: PathBuf,
    pub found: bool,
}

impl LoadedConfig {
    /// Deferred until logging is up, since the log level itself comes from the file.
    pub fn log_source(&self) {
        if self.found {
            info!("Loaded configuration from: {}", self.path.display());
        } else {
            warn!(
                "Config file not found, using defaults: {}",
                self.path.display()
            );
        }
    }
}

/// Resolves the configuration path (`--config` > `./config/pagewatch.yaml` > user config dir)
/// and parses it. A missing file yields defaults. Environment overrides are applied last.
pub async fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let path = resolve_config_path(config_path, Path::new(LOCAL_CONFIG))?;

    let (mut config, found) = if fs::try_exists(&path).await.unwrap_or(false) {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        (config, true)
    } else {
        (Config::default(), false)
    };
    config.apply_env_overrides();

    Ok(LoadedConfig {
        config,
        path,
        found,
    })
}

fn resolve_config_path(explicit: Option<&PathBuf>, local: &Path) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.clone());
    }
    if local.exists() {
        return Ok(local.to_path_buf());
    }
    let mut path = dirs::config_dir().context("Failed to get config directory")?;
    path.push("pagewatch");
    path.push("config.yaml");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins_over_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("pagewatch.yaml");
        std::fs::write(&local, "log_level: warn\n").unwrap();
        let explicit = dir.path().join("other.yaml");

        assert_eq!(
            resolve_config_path(Some(&explicit), &local).unwrap(),
            explicit
        );
        assert_eq!(resolve_config_path(None, &local).unwrap(), local);
    }

    #[tokio::test]
    async fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        let loaded = load_config(Some(&path)).await.unwrap();
        assert!(!loaded.found);
        assert_eq!(loaded.config.engine.timings.screenshot_interval_ms, 550);
    }

    #[tokio::test]
    async fn invalid_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "engine: [not, a, map]\n").unwrap();
        assert!(load_config(Some(&path)).await.is_err());
    }
}
