// Reconciliation state machine.
//
// Per piece: correct -> segment -> align against the previous piece's unwritten
// tail -> commit, retry, or roll back one piece. One piece is in flight at a
// time; piece records live in an owned Vec indexed by piece number and the
// Reconciler is their only mutator.

use std::ops::Range;
use std::time::Instant;

use indicatif::ProgressBar;
use tracing::{debug, info, warn};

use crate::aligner::{align, alignment_head, is_accepted, span_key, AlignmentResult};
use crate::chunker::Piece;
use crate::config::{CorrectionConfig, ServiceErrorPolicy};
use crate::corrector::{preserve_edges, Corrector};
use crate::error::{MendError, Result};
use crate::ledger::Ledger;
use crate::sentence_detector::{Segmenter, Sentence};
use crate::stats::RunStats;

/// Correction state of one piece
#[derive(Debug, Clone)]
struct PieceRecord {
    piece: Piece,
    corrected: String,
    sentences: Vec<Sentence>,
    /// Sentence range of `sentences` appended to the output
    written: Range<usize>,
    retries: usize,
}

impl PieceRecord {
    fn new(piece: Piece) -> Self {
        Self {
            piece,
            corrected: String::new(),
            sentences: Vec::new(),
            written: 0..0,
            retries: 0,
        }
    }

    fn accept(&mut self, corrected: String, sentences: Vec<Sentence>, written: Range<usize>) {
        self.corrected = corrected;
        self.sentences = sentences;
        self.written = written;
    }

    fn reset(&mut self) {
        self.corrected.clear();
        self.sentences.clear();
        self.written = 0..0;
        self.retries = 0;
    }

    /// Text of the committed sentence range
    fn written_text(&self) -> &str {
        span_text(&self.corrected, &self.sentences, self.written.clone())
    }

    /// Sentences left for the next piece to commit; the anchor of its alignment
    fn unwritten_tail(&self) -> &[Sentence] {
        &self.sentences[self.written.end..]
    }

    /// Already-written part of the last `shared` sentences, the overlap the next piece repeats
    fn written_window(&self, shared: usize) -> &[Sentence] {
        let window = self.sentences.len().saturating_sub(shared).min(self.written.end);
        &self.sentences[window..self.written.end]
    }
}

/// Result of one correction call after the service-error policy is applied
#[derive(Debug)]
enum CorrectionOutcome {
    Corrected(String),
    /// Service failed and the source text stands in
    Degraded(String),
}

#[derive(Debug, PartialEq, Eq)]
enum Transition {
    Commit { written_start: usize },
    Retry,
    RollBack,
}

/// Drives a whole document through correction and commits it to a ledger
pub struct Reconciler<'a> {
    config: &'a CorrectionConfig,
    segmenter: &'a dyn Segmenter,
    corrector: &'a dyn Corrector,
    progress: ProgressBar,
}

impl<'a> Reconciler<'a> {
    pub fn new(config: &'a CorrectionConfig, segmenter: &'a dyn Segmenter, corrector: &'a dyn Corrector) -> Self {
        Self {
            config,
            segmenter,
            corrector,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Correct and commit every piece, in order, until all are committed
    pub async fn run(&self, pieces: Vec<Piece>, ledger: &mut Ledger) -> Result<RunStats> {
        let started = Instant::now();
        let total = pieces.len();
        let mut records: Vec<PieceRecord> = pieces.into_iter().map(PieceRecord::new).collect();
        let mut stats = RunStats::new(total);
        let mut idx = 0;

        self.progress.set_length(total as u64);
        self.progress.set_position(0);

        while idx < total {
            info!("Correcting piece {}/{}", idx + 1, total);
            self.progress.set_message(format!("piece {}/{}", idx + 1, total));

            let corrected = match self.correct(&records[idx].piece, &mut stats).await? {
                CorrectionOutcome::Corrected(text) => text,
                CorrectionOutcome::Degraded(text) => text,
            };
            let sentences = self.segmenter.segment(&corrected);

            let transition = if idx == 0 {
                Transition::Commit { written_start: 0 }
            } else {
                let shared = records[idx].piece.overlap_sentences;
                self.decide(idx, &records[idx - 1], shared, &sentences, records[idx].retries)
            };

            match transition {
                Transition::Commit { written_start } => {
                    let next_shared = records.get(idx + 1).map(|next| next.piece.overlap_sentences);
                    let written = commit_range(&sentences, written_start, next_shared);
                    debug!("Piece {} commits sentences {:?} of {}", idx + 1, written, sentences.len());

                    records[idx].accept(corrected, sentences, written);
                    ledger.commit(idx, records[idx].written_text()).await?;
                    idx += 1;
                    self.progress.set_position(idx as u64);
                }
                Transition::Retry => {
                    records[idx].retries += 1;
                    stats.retries += 1;
                    warn!(
                        "Retrying piece {}/{} (attempt {} of {})",
                        idx + 1,
                        total,
                        records[idx].retries + 1,
                        self.config.max_alignment_retries + 1
                    );
                }
                Transition::RollBack => {
                    stats.rollbacks += 1;
                    if stats.rollbacks > self.config.max_rollbacks {
                        return Err(MendError::IrreconcilableDocument {
                            rollbacks: stats.rollbacks,
                            ceiling: self.config.max_rollbacks,
                        });
                    }

                    records[idx].reset();
                    idx -= 1;
                    if idx == 0 {
                        ledger.rollback_to_start().await?;
                    } else {
                        ledger.rollback().await?;
                    }
                    records[idx].reset();

                    warn!(
                        "Piece {} exhausted {} retries; rolled back to piece {}/{} (output now {} bytes)",
                        idx + 2,
                        self.config.max_alignment_retries,
                        idx + 1,
                        total,
                        ledger.len_bytes()
                    );
                    self.progress.set_position(idx as u64);
                }
            }
        }

        stats.chars_written = ledger.len_chars();
        stats.bytes_written = ledger.len_bytes();
        stats.processing_time_ms = started.elapsed().as_millis() as u64;
        self.progress.finish_with_message("done");

        info!(
            "Reconciled {} pieces into {}: {} attempts, {} retries, {} rollbacks, {} service failures",
            stats.pieces,
            ledger.path().display(),
            stats.correction_attempts,
            stats.retries,
            stats.rollbacks,
            stats.service_failures
        );
        Ok(stats)
    }

    async fn correct(&self, piece: &Piece, stats: &mut RunStats) -> Result<CorrectionOutcome> {
        stats.correction_attempts += 1;

        match self.corrector.correct(&piece.source_text).await {
            Ok(response) => Ok(CorrectionOutcome::Corrected(preserve_edges(&piece.source_text, &response))),
            Err(err) => {
                stats.service_failures += 1;
                match self.config.service_error_policy {
                    ServiceErrorPolicy::UseSource => {
                        warn!("Correction failed for piece {}: {}; using the original text", piece.index + 1, err);
                        Ok(CorrectionOutcome::Degraded(piece.source_text.clone()))
                    }
                    ServiceErrorPolicy::Abort => Err(err.into()),
                }
            }
        }
    }

    /// Align the previous piece's unwritten tail against the head of `sentences`
    fn decide(
        &self,
        idx: usize,
        previous: &PieceRecord,
        shared: usize,
        sentences: &[Sentence],
        retries: usize,
    ) -> Transition {
        let tail = previous.unwritten_tail();
        if tail.is_empty() {
            warn!(
                "Piece {} left no unwritten sentences to align piece {} against",
                idx,
                idx + 1
            );
            return self.retry_or_roll_back(retries);
        }

        let head = alignment_head(sentences, self.config.overlap_budget());
        let result = align(tail, head);

        if is_accepted(result.similarity, self.config.mismatch_threshold) {
            let written_start = self.written_start(previous, shared, head, &result);
            debug!(
                "Piece {} aligned at {:.4}, committing from sentence {}",
                idx + 1,
                result.similarity,
                written_start
            );
            return Transition::Commit { written_start };
        }

        warn!(
            similarity = result.similarity,
            required = 1.0 - self.config.mismatch_threshold,
            previous = %span_key(&tail[result.tail_offset..]),
            current = %span_key(&head[result.current_start..result.current_end]),
            "Overlap mismatch between pieces {} and {}: similarity below threshold",
            idx,
            idx + 1
        );
        self.retry_or_roll_back(retries)
    }

    /// First sentence of `head` not yet in the output, never past the accepted tail match
    ///
    /// A match of the whole tail places it directly. When only a suffix of the tail
    /// matched, its leading sentences were reworded; the written part of the shared
    /// window then locates them if that alignment is itself accepted.
    fn written_start(
        &self,
        previous: &PieceRecord,
        shared: usize,
        head: &[Sentence],
        result: &AlignmentResult,
    ) -> usize {
        if result.tail_offset == 0 {
            return result.current_start;
        }

        let written = previous.written_window(shared);
        let before = &head[..result.current_start];
        if !written.is_empty() && !before.is_empty() {
            let located = align(written, before);
            if is_accepted(located.similarity, self.config.mismatch_threshold) {
                return located.current_end;
            }
        }
        result.current_start.saturating_sub(result.tail_offset)
    }

    fn retry_or_roll_back(&self, retries: usize) -> Transition {
        if retries < self.config.max_alignment_retries {
            Transition::Retry
        } else {
            Transition::RollBack
        }
    }
}

/// Sentence range a piece commits, given where its unwritten content starts
///
/// The last piece (`next_shared` is `None`) commits everything left. Any other
/// piece stops at the midpoint of the `next_shared` sentences the next piece
/// repeats, and always leaves a non-blank sentence for it to anchor on.
fn commit_range(sentences: &[Sentence], written_start: usize, next_shared: Option<usize>) -> Range<usize> {
    let len = sentences.len();
    let start = written_start.min(len);
    let Some(shared) = next_shared else {
        return start..len;
    };

    let window = len.saturating_sub(shared);
    let midpoint = window + (len - window) / 2;
    let mut end = midpoint.min(len.saturating_sub(1)).max(start);
    // Blank lines all share one empty key
    while end > start && sentences[end..].iter().all(|s| s.text.trim().is_empty()) {
        end -= 1;
    }
    start..end
}

/// Exact text of a sentence range (sentences tile the text, so gaps are impossible)
fn span_text<'t>(text: &'t str, sentences: &[Sentence], range: Range<usize>) -> &'t str {
    if range.is_empty() {
        return "";
    }
    &text[sentences[range.start].start_byte..sentences[range.end - 1].end_byte]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::Chunker;
    use crate::error::CorrectionError;
    use crate::sentence_detector::RuleSegmenter;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Corrector answering from a closure that sees the text and its call number for that text
    struct ScriptedCorrector<F> {
        calls: Mutex<HashMap<String, usize>>,
        respond: F,
    }

    impl<F> ScriptedCorrector<F>
    where
        F: Fn(&str, usize) -> std::result::Result<String, CorrectionError> + Send + Sync,
    {
        fn new(respond: F) -> Self {
            Self {
                calls: Mutex::new(HashMap::new()),
                respond,
            }
        }
    }

    #[async_trait]
    impl<F> Corrector for ScriptedCorrector<F>
    where
        F: Fn(&str, usize) -> std::result::Result<String, CorrectionError> + Send + Sync,
    {
        async fn correct(&self, text: &str) -> std::result::Result<String, CorrectionError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                let count = calls.entry(text.to_string()).or_insert(0);
                *count += 1;
                *count
            };
            (self.respond)(text, call)
        }
    }

    fn numbered_document(count: usize) -> String {
        (0..count).map(|i| format!("Sentence {i:02} says hello. ")).collect()
    }

    fn small_config() -> CorrectionConfig {
        CorrectionConfig {
            chunk_char_budget: 200,
            overlap_percent: 50,
            ..Default::default()
        }
    }

    async fn run_document(
        text: &str,
        config: &CorrectionConfig,
        corrector: &dyn Corrector,
    ) -> (Result<RunStats>, String) {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("out.txt");
        let segmenter = RuleSegmenter::with_default_rules();
        let pieces = Chunker::new(&segmenter, config.chunk_char_budget, config.overlap_percent)
            .chunk(text)
            .unwrap();

        let mut ledger = Ledger::create(&output).await.unwrap();
        let result = Reconciler::new(config, &segmenter, corrector).run(pieces, &mut ledger).await;
        let written = tokio::fs::read_to_string(&output).await.unwrap_or_default();
        (result, written)
    }

    #[tokio::test]
    async fn test_identity_corrector_reproduces_document() {
        let text = format!("{}\nTail line one.\n\nTail line two.\n", numbered_document(40));
        let corrector = ScriptedCorrector::new(|t: &str, _| Ok(t.to_string()));

        let (result, written) = run_document(&text, &small_config(), &corrector).await;
        let stats = result.unwrap();

        assert!(stats.pieces > 2);
        assert_eq!(written, text);
        assert_eq!(stats.retries, 0);
        assert_eq!(stats.rollbacks, 0);
        assert_eq!(stats.correction_attempts, stats.pieces);
        assert_eq!(stats.chars_written, text.chars().count());
    }

    #[tokio::test]
    async fn test_single_piece_output_is_response() {
        let text = "Helo wordl.\nSecond sentnce here.";
        let corrector = ScriptedCorrector::new(|_: &str, _| Ok("Hello world.\nSecond sentence here.".to_string()));

        let (result, written) = run_document(text, &CorrectionConfig::default(), &corrector).await;
        assert_eq!(result.unwrap().pieces, 1);
        assert_eq!(written, "Hello world.\nSecond sentence here.");
    }

    #[tokio::test]
    async fn test_transient_mismatch_is_retried() {
        let text = numbered_document(16);
        // Second piece answers with unrelated text twice before behaving
        let corrector = ScriptedCorrector::new(|t: &str, call| {
            if t.contains("Sentence 07") && !t.contains("Sentence 08") && call <= 2 {
                Ok("Completely unrelated words. Nothing matches here.".to_string())
            } else {
                Ok(t.to_string())
            }
        });

        let (result, written) = run_document(&text, &small_config(), &corrector).await;
        let stats = result.unwrap();

        assert_eq!(written, text);
        assert_eq!(stats.retries, 2);
        assert_eq!(stats.rollbacks, 0);
    }

    #[tokio::test]
    async fn test_service_failure_falls_back_to_source() {
        let text = numbered_document(12);
        let corrector = ScriptedCorrector::new(|_: &str, _| Err(CorrectionError::EmptyResponse));

        let (result, written) = run_document(&text, &small_config(), &corrector).await;
        let stats = result.unwrap();

        assert_eq!(written, text);
        assert_eq!(stats.service_failures, stats.pieces);
    }

    #[tokio::test]
    async fn test_service_failure_aborts_when_configured() {
        let text = numbered_document(12);
        let config = CorrectionConfig {
            service_error_policy: ServiceErrorPolicy::Abort,
            ..small_config()
        };
        let corrector = ScriptedCorrector::new(|_: &str, _| Err(CorrectionError::EmptyResponse));

        let (result, _) = run_document(&text, &config, &corrector).await;
        assert!(matches!(result, Err(MendError::Correction(CorrectionError::EmptyResponse))));
    }

    #[tokio::test]
    async fn test_unreconcilable_document_hits_ceiling() {
        let text = numbered_document(12);
        let config = CorrectionConfig {
            max_rollbacks: 2,
            ..small_config()
        };
        // Pieces after the second never align with their predecessor
        let corrector = ScriptedCorrector::new(|t: &str, _| {
            if t.starts_with("Sentence 00") {
                Ok(t.to_string())
            } else {
                Ok("Xylophone quartz vortex. Jumbled zebra pyjamas.".to_string())
            }
        });

        let (result, _) = run_document(&text, &config, &corrector).await;
        match result {
            Err(MendError::IrreconcilableDocument { rollbacks, ceiling }) => {
                assert_eq!(rollbacks, 3);
                assert_eq!(ceiling, 2);
            }
            other => panic!("expected IrreconcilableDocument, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_length_changing_corrector_reproduces_document() {
        // Shortens every sentence, lengthens a third of them
        let reword = |t: &str| {
            t.replace("says hello", "hi")
                .replace("Sentence 1", "Line number 1")
                .replace("Sentence 2", "The sentence numbered 2")
        };
        let text = numbered_document(36);
        let corrector = ScriptedCorrector::new(move |t: &str, _| Ok(reword(t)));

        for (budget, overlap) in [(120, 40), (120, 60), (160, 50), (200, 50), (280, 30)] {
            let config = CorrectionConfig {
                chunk_char_budget: budget,
                overlap_percent: overlap,
                ..Default::default()
            };

            let (result, written) = run_document(&text, &config, &corrector).await;
            let stats = result.unwrap_or_else(|e| panic!("budget {budget}, overlap {overlap}: {e}"));
            assert_eq!(written, reword(&text), "budget {budget}, overlap {overlap}");
            assert_eq!(stats.retries, 0);
            assert_eq!(stats.rollbacks, 0);
        }
    }

    #[test]
    fn test_empty_tail_is_a_mismatch() {
        let config = small_config();
        let segmenter = RuleSegmenter::with_default_rules();
        let corrector = ScriptedCorrector::new(|t: &str, _| Ok(t.to_string()));
        let reconciler = Reconciler::new(&config, &segmenter, &corrector);

        let text = numbered_document(4);
        let sentences = segmenter.segment(&text);
        let mut previous = PieceRecord::new(Piece {
            index: 0,
            source_text: text.clone(),
            start_char: 0,
            end_char: text.chars().count(),
            overlap_chars: 0,
            overlap_sentences: 0,
        });
        previous.accept(text.clone(), sentences.clone(), 0..4);

        assert_eq!(reconciler.decide(1, &previous, 4, &sentences, 0), Transition::Retry);
        assert_eq!(
            reconciler.decide(1, &previous, 4, &sentences, config.max_alignment_retries),
            Transition::RollBack
        );
    }

    #[test]
    fn test_commit_start_stays_at_tail_match() {
        let config = small_config();
        let segmenter = RuleSegmenter::with_default_rules();
        let corrector = ScriptedCorrector::new(|t: &str, _| Ok(t.to_string()));
        let reconciler = Reconciler::new(&config, &segmenter, &corrector);

        let text = numbered_document(8);
        let corrected = text.replace("says hello", "hi");
        let mut previous = PieceRecord::new(Piece {
            index: 0,
            source_text: text.clone(),
            start_char: 0,
            end_char: text.chars().count(),
            overlap_chars: 0,
            overlap_sentences: 0,
        });
        previous.accept(corrected.clone(), segmenter.segment(&corrected), 0..6);

        // The next piece repeats the last four shortened sentences
        let current: String = numbered_document(12)
            .replace("says hello", "hi")
            .chars()
            .skip(4 * 16)
            .collect();
        let sentences = segmenter.segment(&current);
        assert!(sentences[0].text.starts_with("Sentence 04"));

        assert_eq!(
            reconciler.decide(1, &previous, 4, &sentences, 0),
            Transition::Commit { written_start: 2 }
        );
    }

    #[test]
    fn test_commit_range_midpoint() {
        let segmenter = RuleSegmenter::with_default_rules();
        let sentences = segmenter.segment(&numbered_document(8));

        // The next piece repeats the last four sentences
        assert_eq!(commit_range(&sentences, 2, Some(4)), 2..6);
        assert_eq!(commit_range(&sentences, 7, Some(4)), 7..7);
        assert_eq!(commit_range(&sentences, 2, Some(1)), 2..7);
        assert_eq!(commit_range(&sentences, 2, None), 2..8);
        assert_eq!(commit_range(&sentences, 12, None), 8..8);
    }

    #[test]
    fn test_commit_range_keeps_an_unwritten_anchor() {
        let segmenter = RuleSegmenter::with_default_rules();
        let sentences = segmenter.segment("One is here.\nTwo is here.\nThree is here.\n\n\n");
        assert_eq!(sentences.len(), 5);

        // Midpoint would leave only blank lines unwritten
        assert_eq!(commit_range(&sentences, 0, Some(2)), 0..2);
        // Never everything, even when the start is the last sentence
        assert_eq!(commit_range(&sentences, 4, Some(5)), 4..4);
        assert_eq!(commit_range(&sentences, 0, Some(5)).end, 2);
    }

    #[test]
    fn test_span_text_uses_exact_bytes() {
        let segmenter = RuleSegmenter::with_default_rules();
        let text = "Perché no? Così sia.\nFine.";
        let sentences = segmenter.segment(text);

        assert_eq!(span_text(text, &sentences, 1..3), "Così sia.\nFine.");
        assert_eq!(span_text(text, &sentences, 1..1), "");
    }
}
