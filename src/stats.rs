// Run statistics written as JSON next to the corrected output.

use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Counters for one correction run
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    /// Pieces the document was split into
    pub pieces: usize,
    /// Calls made to the correction service, retries and re-corrections included
    pub correction_attempts: usize,
    /// Alignment failures answered with a fresh correction of the same piece
    pub retries: usize,
    /// Commits undone after a piece exhausted its retries
    pub rollbacks: usize,
    /// Service failures handled by the configured policy
    pub service_failures: usize,
    /// Final output size
    pub chars_written: usize,
    pub bytes_written: u64,
    pub processing_time_ms: u64,
}

impl RunStats {
    pub fn new(pieces: usize) -> Self {
        Self {
            pieces,
            ..Default::default()
        }
    }

    /// Write pretty-printed JSON to `path`
    pub async fn write_json(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
