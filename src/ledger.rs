// Commit ledger over the output file.
// Every operation is scoped: open, mutate, flush + sync, close. A checkpoint is
// pushed only after its bytes are durably on disk, so the checkpoint stack never
// describes data that is not there.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::LedgerError;

/// What one commit added to the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub piece_index: usize,
    /// Bytes appended (truncation unit)
    pub bytes: u64,
    pub chars: usize,
}

/// Append-only output with a rollback stack, one checkpoint per committed piece
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    checkpoints: Vec<Checkpoint>,
}

impl Ledger {
    /// Start a fresh, empty output file, removing any stale one
    pub async fn create(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        remove_if_exists(&path).await?;
        fs::write(&path, b"").await.map_err(|source| io_error(&path, source))?;

        info!("Created output file {}", path.display());
        Ok(Self {
            path,
            checkpoints: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    /// Committed output length in bytes
    pub fn len_bytes(&self) -> u64 {
        self.checkpoints.iter().map(|c| c.bytes).sum()
    }

    /// Committed output length in characters
    pub fn len_chars(&self) -> usize {
        self.checkpoints.iter().map(|c| c.chars).sum()
    }

    /// Append `text` and record a checkpoint for it (possibly empty)
    pub async fn commit(&mut self, piece_index: usize, text: &str) -> Result<(), LedgerError> {
        if let Err(err) = self.append_durably(text).await {
            // Drop any partial append so the file matches the checkpoint stack again
            self.truncate_to(self.len_bytes()).await?;
            return Err(err);
        }

        self.checkpoints.push(Checkpoint {
            piece_index,
            bytes: text.len() as u64,
            chars: text.chars().count(),
        });
        debug!("Committed piece {} ({} bytes), output now {} bytes", piece_index, text.len(), self.len_bytes());
        Ok(())
    }

    /// Undo the most recent commit, restoring the output to its length before it
    pub async fn rollback(&mut self) -> Result<Checkpoint, LedgerError> {
        let checkpoint = *self.checkpoints.last().ok_or(LedgerError::NothingToRollBack)?;
        let keep = self.len_bytes() - checkpoint.bytes;

        self.truncate_to(keep).await?;
        self.checkpoints.pop();

        info!(
            "Rolled back piece {} ({} bytes), output now {} bytes",
            checkpoint.piece_index, checkpoint.bytes, keep
        );
        Ok(checkpoint)
    }

    /// Discard the whole output; the next commit starts a new file
    pub async fn rollback_to_start(&mut self) -> Result<(), LedgerError> {
        remove_if_exists(&self.path).await?;
        self.checkpoints.clear();
        info!("Discarded output {}", self.path.display());
        Ok(())
    }

    async fn append_durably(&self, text: &str) -> Result<(), LedgerError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|source| io_error(&self.path, source))?;

        file.write_all(text.as_bytes())
            .await
            .map_err(|source| io_error(&self.path, source))?;
        file.flush().await.map_err(|source| io_error(&self.path, source))?;
        file.sync_data().await.map_err(|source| io_error(&self.path, source))?;
        Ok(())
    }

    async fn truncate_to(&self, len: u64) -> Result<(), LedgerError> {
        let file = match OpenOptions::new().write(true).open(&self.path).await {
            Ok(file) => file,
            // Nothing on disk means nothing to cut
            Err(err) if err.kind() == ErrorKind::NotFound && len == 0 => return Ok(()),
            Err(source) => return Err(io_error(&self.path, source)),
        };

        file.set_len(len).await.map_err(|source| io_error(&self.path, source))?;
        file.sync_data().await.map_err(|source| io_error(&self.path, source))?;
        Ok(())
    }
}

async fn remove_if_exists(path: &Path) -> Result<(), LedgerError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(io_error(path, source)),
    }
}

fn io_error(path: &Path, source: std::io::Error) -> LedgerError {
    LedgerError::Io {
        path: path.to_path_buf(),
        source,
    }
}
