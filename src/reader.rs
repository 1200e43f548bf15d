use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::error::{MendError, Result};

/// Configuration for document reading
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Buffer size for async reading (default: 8KB)
    pub buffer_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self { buffer_size: 8192 }
    }
}

/// Statistics for one document read
#[derive(Debug, Clone)]
pub struct ReadStats {
    pub file_path: String,
    pub chars_read: u64,
    pub bytes_read: u64,
    pub duration_ms: u64,
}

/// Reads whole documents byte-exact (line endings and trailing newlines included)
pub struct AsyncFileReader {
    config: ReaderConfig,
}

impl AsyncFileReader {
    pub fn new(config: ReaderConfig) -> Self {
        Self { config }
    }

    /// Read a UTF-8 document; invalid UTF-8 is an input error, never replaced
    pub async fn read_document<P: AsRef<Path>>(&self, file_path: P) -> Result<(String, ReadStats)> {
        let path = file_path.as_ref();
        let start_time = std::time::Instant::now();
        let input_error = |source| MendError::Input {
            path: path.to_path_buf(),
            source,
        };

        debug!("Starting async read of document: {}", path.display());

        let file = File::open(path).await.map_err(|e| {
            warn!("Failed to open {}: {}", path.display(), e);
            input_error(e)
        })?;

        let mut reader = BufReader::with_capacity(self.config.buffer_size, file);
        let mut content = String::new();
        reader.read_to_string(&mut content).await.map_err(|e| {
            warn!("Failed to read {} as UTF-8: {}", path.display(), e);
            input_error(e)
        })?;

        let stats = ReadStats {
            file_path: path.display().to_string(),
            chars_read: content.chars().count() as u64,
            bytes_read: content.len() as u64,
            duration_ms: start_time.elapsed().as_millis() as u64,
        };

        info!(
            "Read {}: {} chars, {} bytes in {}ms",
            stats.file_path, stats.chars_read, stats.bytes_read, stats.duration_ms
        );
        Ok((content, stats))
    }
}

/// Read a single document with default configuration
pub async fn read_file_async<P: AsRef<Path>>(file_path: P) -> Result<String> {
    let reader = AsyncFileReader::new(ReaderConfig::default());
    let (content, _stats) = reader.read_document(file_path).await?;
    Ok(content)
}
