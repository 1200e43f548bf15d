pub mod aligner;
pub mod chunker;
pub mod config;
pub mod corrector;
pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod reader;
pub mod sentence_detector;
pub mod stats;

// Re-export main types for convenient access
pub use sentence_detector::{RuleSegmenter, Segmenter, Sentence, SentenceBoundaryRules};

pub use aligner::{align, is_accepted, similarity, AlignmentResult};
pub use chunker::{Chunker, Piece};
pub use config::{CorrectionConfig, ServiceErrorPolicy};
pub use corrector::{build_prompt, Corrector, OllamaCorrector};
pub use error::{ChunkError, ConfigError, CorrectionError, LedgerError, MendError, Result};
pub use ledger::{Checkpoint, Ledger};
pub use orchestrator::Reconciler;
pub use reader::{read_file_async, AsyncFileReader, ReaderConfig};
pub use stats::RunStats;
