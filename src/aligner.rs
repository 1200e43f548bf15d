// Overlap alignment between the retained tail of one corrected piece and the
// head of the next. Exhaustive over offsets and sub-ranges, so callers must only
// pass spans bounded by the overlap budget (see `alignment_head`).

use similar::TextDiff;
use tracing::debug;

use crate::sentence_detector::{append_comparison_key, comparison_key, Sentence};

/// Best alignment found between a previous tail and a current sentence sequence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentResult {
    /// Edit similarity of the best pair, in [0, 1]
    pub similarity: f64,
    /// Index into the previous tail where the matched span starts
    pub tail_offset: usize,
    /// Half-open sentence range of the match in the current sequence
    pub current_start: usize,
    pub current_end: usize,
}

impl AlignmentResult {
    fn none() -> Self {
        Self {
            similarity: 0.0,
            tail_offset: 0,
            current_start: 0,
            current_end: 0,
        }
    }
}

/// Character-level edit similarity: 2 * matches / (len(a) + len(b))
///
/// Symmetric, 1.0 for identical strings (including two empty ones), 0.0 when
/// the strings share no characters.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    f64::from(TextDiff::from_chars(a, b).ratio())
}

/// Acceptance rule: `similarity >= 1 - mismatch_threshold`
pub fn is_accepted(similarity: f64, mismatch_threshold: f64) -> bool {
    similarity >= 1.0 - mismatch_threshold
}

/// Comparison key of a sentence span: normalized sentence texts joined by single spaces
pub fn span_key(sentences: &[Sentence]) -> String {
    let mut key = String::new();
    for (i, sentence) in sentences.iter().enumerate() {
        if i > 0 {
            key.push(' ');
        }
        append_comparison_key(&sentence.text, &mut key);
    }
    key
}

/// Leading sentences of a corrected piece that may hold the shared overlap
///
/// Sentences starting inside twice the overlap budget, plus one more, so a
/// corrector that lengthened the overlap still leaves all of it in the head.
pub fn alignment_head(sentences: &[Sentence], overlap_budget: usize) -> &[Sentence] {
    let limit = overlap_budget.saturating_mul(2);
    let inside = sentences
        .iter()
        .take_while(|s| s.start_char < limit)
        .count();
    &sentences[..(inside + 1).min(sentences.len())]
}

/// Find the best-matching pair of spans
///
/// Every start offset into `previous_tail` is compared (as a suffix) against
/// every contiguous sub-range of `current`. The globally best similarity wins;
/// ties keep the first found (offset ascending, then sub-range start, then end).
/// An empty side never aligns.
pub fn align(previous_tail: &[Sentence], current: &[Sentence]) -> AlignmentResult {
    if previous_tail.is_empty() || current.is_empty() {
        return AlignmentResult::none();
    }

    let current_keys: Vec<String> = current.iter().map(|s| comparison_key(&s.text)).collect();
    let mut best: Option<AlignmentResult> = None;
    let mut span = String::new();

    for tail_offset in 0..previous_tail.len() {
        let tail = span_key(&previous_tail[tail_offset..]);

        for current_start in 0..current.len() {
            span.clear();
            for current_end in current_start + 1..=current.len() {
                if current_end > current_start + 1 {
                    span.push(' ');
                }
                span.push_str(&current_keys[current_end - 1]);

                let score = similarity(&tail, &span);
                if best.map_or(true, |b| score > b.similarity) {
                    best = Some(AlignmentResult {
                        similarity: score,
                        tail_offset,
                        current_start,
                        current_end,
                    });
                }
            }
        }
    }

    let result = best.unwrap_or_else(AlignmentResult::none);
    debug!(
        "Best alignment {:.4}: tail[{}..] ~ current[{}..{}]",
        result.similarity, result.tail_offset, result.current_start, result.current_end
    );
    result
}
