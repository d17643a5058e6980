use std::path::Path;

use crate::config::types::SourceResourceConfig;
use crate::error::Result;

/// Write an extracted config as pretty JSON.
pub fn save_config(config: &SourceResourceConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    tracing::info!(path = %path.display(), identifier = %config.identifier, "Saved source config");
    Ok(())
}

/// Read a config previously written by `save_config`.
pub fn load_config(path: &Path) -> Result<SourceResourceConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: SourceResourceConfig = serde_json::from_str(&content)?;
    tracing::debug!(path = %path.display(), identifier = %config.identifier, "Loaded source config");
    Ok(config)
}
