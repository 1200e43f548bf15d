use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::info;

use mend::{
    AsyncFileReader, Chunker, CorrectionConfig, Ledger, OllamaCorrector, ReaderConfig, Reconciler, RuleSegmenter,
    ServiceErrorPolicy,
};

#[derive(Parser, Debug)]
#[command(name = "mend")]
#[command(about = "Corrects a large text through an LLM in overlapping pieces and stitches them back together")]
#[command(version)]
struct Args {
    /// Text file to correct
    input: PathBuf,

    /// Where to write the corrected text (replaced if it exists)
    output: PathBuf,

    /// JSON config file; command-line options override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum characters per piece, overlap included
    #[arg(long)]
    chunk_char_budget: Option<usize>,

    /// Share of each piece copied from the previous one (1-99)
    #[arg(long)]
    overlap_percent: Option<usize>,

    /// Accepted overlap dissimilarity, e.g. 0.02 accepts similarity >= 0.98
    #[arg(long)]
    mismatch_threshold: Option<f64>,

    /// Fresh corrections of a piece before rolling back to the previous one
    #[arg(long)]
    max_alignment_retries: Option<usize>,

    /// Rollbacks allowed over the whole run before giving up
    #[arg(long)]
    max_rollbacks: Option<usize>,

    /// Model used by the correction service
    #[arg(long, env = "MEND_MODEL")]
    model: Option<String>,

    /// Base URL of the Ollama-compatible correction service
    #[arg(long, env = "MEND_SERVICE_URL")]
    service_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    request_timeout_secs: Option<u64>,

    /// What to do when the correction service fails for a piece
    #[arg(long, value_enum)]
    on_service_error: Option<ServiceErrorPolicy>,

    /// Suppress console progress bar
    #[arg(long)]
    no_progress: bool,

    /// Write run statistics as JSON to this path
    #[arg(long)]
    stats_out: Option<PathBuf>,
}

impl Args {
    /// Defaults, then the config file, then explicit options
    async fn resolve_config(&self) -> Result<CorrectionConfig> {
        let mut config = match &self.config {
            Some(path) => CorrectionConfig::load(path).await?,
            None => CorrectionConfig::default(),
        };

        if let Some(v) = self.chunk_char_budget {
            config.chunk_char_budget = v;
        }
        if let Some(v) = self.overlap_percent {
            config.overlap_percent = v;
        }
        if let Some(v) = self.mismatch_threshold {
            config.mismatch_threshold = v;
        }
        if let Some(v) = self.max_alignment_retries {
            config.max_alignment_retries = v;
        }
        if let Some(v) = self.max_rollbacks {
            config.max_rollbacks = v;
        }
        if let Some(v) = &self.model {
            config.model = v.clone();
        }
        if let Some(v) = &self.service_url {
            config.service_url = v.clone();
        }
        if let Some(v) = self.request_timeout_secs {
            config.request_timeout_secs = v;
        }
        if let Some(v) = self.on_service_error {
            config.service_error_policy = v;
        }

        config.validate()?;
        Ok(config)
    }
}

fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{msg} [{bar:40.cyan/blue}] {pos}/{len}")
        .unwrap_or_else(|e| {
            eprintln!("Failed to create progress bar template: {e}");
            ProgressStyle::default_bar()
        })
        .progress_chars("=>-");
    pb.set_style(style);
    pb
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .json()
        .init();

    let args = Args::parse();

    info!("Starting mend");
    info!(?args, "Parsed CLI arguments");

    // Fail before touching the output
    if !args.input.exists() {
        anyhow::bail!("Input file does not exist: {}", args.input.display());
    }
    if !args.input.is_file() {
        anyhow::bail!("Input path is not a file: {}", args.input.display());
    }

    let config = args.resolve_config().await?;
    info!(?config, "Resolved configuration");

    // Stale output goes before anything else can abort the run
    let mut ledger = Ledger::create(&args.output).await?;

    let reader = AsyncFileReader::new(ReaderConfig::default());
    let (text, read_stats) = reader.read_document(&args.input).await?;

    let segmenter = RuleSegmenter::with_default_rules();
    let pieces = Chunker::new(&segmenter, config.chunk_char_budget, config.overlap_percent).chunk(&text)?;

    let corrector = OllamaCorrector::from_config(&config).context("Failed to build correction client")?;

    let progress = if args.no_progress {
        ProgressBar::hidden()
    } else {
        create_progress_bar(pieces.len() as u64)
    };

    let stats = Reconciler::new(&config, &segmenter, &corrector)
        .with_progress(progress)
        .run(pieces, &mut ledger)
        .await?;

    info!(
        "Corrected {} chars into {} chars across {} pieces in {}ms",
        read_stats.chars_read, stats.chars_written, stats.pieces, stats.processing_time_ms
    );

    if let Some(stats_path) = &args.stats_out {
        stats.write_json(stats_path).await?;
        info!("Wrote run statistics to {}", stats_path.display());
    }

    println!("Done! Output in: {}", args.output.display());
    Ok(())
}
