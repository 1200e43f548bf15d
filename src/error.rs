// Error kinds surfaced by the correction pipeline.
// Alignment failure is deliberately absent: it drives retry/rollback transitions
// inside the orchestrator and only surfaces as IrreconcilableDocument.

use std::path::PathBuf;

/// Chunking failures, raised before any correction starts
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    /// A single sentence is longer than half the overlap budget
    #[error("sentence of {chars} chars exceeds the limit of {limit} chars (half the overlap budget); increase the chunk budget: \"{preview}\"")]
    PieceTooLarge {
        chars: usize,
        limit: usize,
        preview: String,
    },
}

/// Correction service failures (transport, status, body)
#[derive(Debug, thiserror::Error)]
pub enum CorrectionError {
    #[error("correction service unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("correction service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed correction response: {0}")]
    MalformedResponse(String),

    #[error("correction service returned an empty response")]
    EmptyResponse,
}

/// Output ledger failures
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("output I/O failed on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("rollback requested with no commit to undo")]
    NothingToRollBack,
}

/// Invalid configuration values or unreadable config files
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Umbrella error for a whole correction run
#[derive(Debug, thiserror::Error)]
pub enum MendError {
    #[error(transparent)]
    Chunk(#[from] ChunkError),

    #[error(transparent)]
    Correction(#[from] CorrectionError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to read input {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Rollbacks exceeded the run-wide ceiling without the pieces ever aligning
    #[error("document could not be reconciled: {rollbacks} rollbacks exceeded the ceiling of {ceiling}")]
    IrreconcilableDocument { rollbacks: usize, ceiling: usize },
}

pub type Result<T> = std::result::Result<T, MendError>;
