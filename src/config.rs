// Run configuration: built-in defaults, an optional JSON file, then CLI overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;

/// What to do when the correction service fails for a piece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceErrorPolicy {
    /// Keep going with the uncorrected source text for that piece
    UseSource,
    /// Stop the whole run
    Abort,
}

/// Every tunable of a correction run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Maximum characters per piece, overlap included
    pub chunk_char_budget: usize,
    /// Share of the budget copied from the previous piece
    pub overlap_percent: usize,
    /// Accepted overlap dissimilarity (0.02 accepts similarity >= 0.98)
    pub mismatch_threshold: f64,
    /// Fresh corrections of the same piece before rolling back
    pub max_alignment_retries: usize,
    /// Rollbacks allowed over the whole run before giving up
    pub max_rollbacks: usize,
    /// Model identifier sent to the correction service
    pub model: String,
    /// Base URL of the Ollama-compatible service
    pub service_url: String,
    pub request_timeout_secs: u64,
    pub service_error_policy: ServiceErrorPolicy,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            chunk_char_budget: 2500,
            overlap_percent: 50,
            mismatch_threshold: 0.02,
            max_alignment_retries: 3,
            max_rollbacks: 10,
            model: "gemma3n".to_string(),
            service_url: "http://localhost:11434".to_string(),
            request_timeout_secs: 300,
            service_error_policy: ServiceErrorPolicy::UseSource,
        }
    }
}

impl CorrectionConfig {
    /// Load a JSON config file; missing keys keep their defaults
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_char_budget == 0 {
            return Err(ConfigError::Invalid("chunk_char_budget must be > 0".into()));
        }
        if !(1..=99).contains(&self.overlap_percent) {
            return Err(ConfigError::Invalid(format!(
                "overlap_percent must be between 1 and 99, got {}",
                self.overlap_percent
            )));
        }
        if !(0.0..=1.0).contains(&self.mismatch_threshold) {
            return Err(ConfigError::Invalid(format!(
                "mismatch_threshold must be between 0 and 1, got {}",
                self.mismatch_threshold
            )));
        }
        if self.max_rollbacks == 0 {
            return Err(ConfigError::Invalid("max_rollbacks must be > 0".into()));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".into()));
        }
        if self.service_url.trim().is_empty() {
            return Err(ConfigError::Invalid("service_url must not be empty".into()));
        }
        Ok(())
    }

    /// Characters of each piece shared with its predecessor
    pub fn overlap_budget(&self) -> usize {
        self.chunk_char_budget * self.overlap_percent / 100
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
