use std::sync::Arc;

use async_trait::async_trait;
use demo_flow::{PortError, ResultStore};
use pagewatch_artifact_store::{ArtifactStore, StoreError};
use pagewatch_core_types::DemoRecord;
use tokio::task;
use tracing::info;

/// [`ResultStore`] over the filesystem store. Blocking IO runs on the blocking pool.
pub struct StoreBridge {
    store: Arc<ArtifactStore>,
}

impl StoreBridge {
    pub fn new(store: Arc<ArtifactStore>) -> Self {
        Self { store }
    }
}

fn store_err(err: StoreError) -> PortError {
    PortError::Store(err.to_string())
}

async fn blocking<T, F>(f: F) -> Result<T, PortError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|err| PortError::Store(format!("store task failed: {err}")))?
        .map_err(store_err)
}

#[async_trait]
impl ResultStore for StoreBridge {
    async fn init(&self) -> Result<(), PortError> {
        let store = Arc::clone(&self.store);
        let stats = blocking(move || {
            store.init()?;
            store.sweep()
        })
        .await?;
        if stats.removed_runs > 0 {
            info!(target: "bridge", removed = stats.removed_runs, "expired runs removed");
        }
        Ok(())
    }

    async fn save(&self, record: DemoRecord) -> Result<String, PortError> {
        let store = Arc::clone(&self.store);
        blocking(move || store.save(&record)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn init_creates_the_store_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ArtifactStore::new(dir.path().join("store"), 7));
        let bridge = StoreBridge::new(Arc::clone(&store));
        bridge.init().await.unwrap();
        assert!(dir.path().join("store/runs").is_dir());
        assert!(store.list().unwrap().is_empty());
    }
}
