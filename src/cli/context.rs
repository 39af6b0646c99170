use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use cdp_adapter::CdpAdapter;
use demo_flow::DemoEngine;
use pagewatch_artifact_store::ArtifactStore;
use tokio::fs;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::bridge::{CdpDriver, PageExecutor, ScreencastCapture, StoreBridge};
use crate::config::Config;

/// Lazily built resources shared by the commands of one invocation.
pub struct CliContext {
    config: Arc<Config>,
    config_path: PathBuf,
    browser: OnceCell<Arc<CdpAdapter>>,
    store: OnceCell<Arc<ArtifactStore>>,
}

impl CliContext {
    pub fn new(config: Config, config_path: PathBuf) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
            browser: OnceCell::new(),
            store: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &Config {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Launches (or attaches to) the browser on first use.
    pub async fn browser(&self) -> Result<Arc<CdpAdapter>> {
        self.browser
            .get_or_try_init(|| async {
                let adapter = Arc::new(CdpAdapter::new(self.config.browser.clone()));
                adapter
                    .start()
                    .await
                    .context("Failed to start the browser session")?;
                info!(
                    page = adapter.target_id().as_deref().unwrap_or("?"),
                    "Browser session ready"
                );
                Ok::<_, anyhow::Error>(adapter)
            })
            .await
            .map(Arc::clone)
    }

    pub async fn store(&self) -> Result<Arc<ArtifactStore>> {
        self.store
            .get_or_try_init(|| async {
                let store = &self.config.store;
                Ok::<_, anyhow::Error>(Arc::new(ArtifactStore::new(
                    store.root.clone(),
                    store.retention_days,
                )))
            })
            .await
            .map(Arc::clone)
    }

    /// Builds an engine over the browser page and the store.
    pub async fn engine(&self, record_video: bool) -> Result<DemoEngine> {
        let adapter = self.browser().await?;
        let timings = self.config.engine.timings.clone();

        let mut driver = CdpDriver::new(Arc::clone(&adapter), timings.clone());
        if let Some(path) = &self.config.executor.script_path {
            let script = fs::read_to_string(path)
                .await
                .with_context(|| format!("reading executor script {}", path.display()))?;
            debug!(path = %path.display(), "executor script loaded");
            driver = driver.with_executor_script(script);
        }

        let store = StoreBridge::new(self.store().await?);
        let mut engine = DemoEngine::new(
            Arc::new(driver),
            Arc::new(PageExecutor::new(Arc::clone(&adapter))),
            Arc::new(store),
            timings,
        )
        .on_saved(Arc::new(|id: &str| info!(id, "Run saved")));
        if record_video {
            engine = engine.with_capture(Arc::new(ScreencastCapture::new(adapter)));
        }
        Ok(engine)
    }

    /// Stops the browser session if one was started.
    pub async fn shutdown(&self) {
        if let Some(adapter) = self.browser.get() {
            adapter.shutdown().await;
            debug!(metrics = ?cdp_adapter::metrics::snapshot(), "cdp session closed");
        }
    }
}
