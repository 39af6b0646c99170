use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tokio::fs;

/// Reads a JSON or YAML document. The extension picks the format; anything else is tried as
/// JSON first, then YAML.
pub async fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    parse_document(path, &raw)
}

pub fn parse_document<T: DeserializeOwned>(path: &Path, raw: &str) -> Result<T> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("json") => {
            serde_json::from_str(raw).with_context(|| format!("parsing {}", path.display()))
        }
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str(raw).with_context(|| format!("parsing {}", path.display()))
        }
        _ => serde_json::from_str(raw)
            .or_else(|_| serde_yaml::from_str(raw))
            .with_context(|| format!("parsing {}", path.display())),
    }
}
