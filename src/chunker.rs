// Splits a document into overlapping, sentence-aligned pieces bounded by a character budget.

use tracing::{debug, info};

use crate::error::ChunkError;
use crate::sentence_detector::{normalize_sentence, Segmenter, Sentence};

/// A bounded, sentence-aligned slice of the source document sent for correction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    pub index: usize,
    /// Leading overlap copied from the previous piece, then this piece's own core
    pub source_text: String,
    /// Document character range covered by `source_text`
    pub start_char: usize,
    pub end_char: usize,
    /// Length of the leading overlap in characters (0 for the first piece)
    pub overlap_chars: usize,
    /// Number of source sentences in the leading overlap
    pub overlap_sentences: usize,
}

impl Piece {
    /// The part of the piece not shared with its predecessor
    pub fn core_text(&self) -> &str {
        match self.source_text.char_indices().nth(self.overlap_chars) {
            Some((byte, _)) => &self.source_text[byte..],
            None => "",
        }
    }
}

/// Index where the overlap window of `sentences` begins
///
/// The window is the longest suffix whose span, measured back from the final
/// character, fits in `budget` characters. A non-empty sequence always keeps at
/// least its final sentence.
pub fn overlap_window_start(sentences: &[Sentence], budget: usize) -> usize {
    let Some(last) = sentences.last() else {
        return 0;
    };

    let mut start = sentences.len() - 1;
    while start > 0 && last.end_char - sentences[start - 1].start_char <= budget {
        start -= 1;
    }
    start
}

/// Greedy sentence accumulator producing overlapping pieces
pub struct Chunker<'a> {
    segmenter: &'a dyn Segmenter,
    char_budget: usize,
    overlap_percent: usize,
}

impl<'a> Chunker<'a> {
    pub fn new(segmenter: &'a dyn Segmenter, char_budget: usize, overlap_percent: usize) -> Self {
        Self {
            segmenter,
            char_budget,
            overlap_percent,
        }
    }

    /// Characters of new content each piece may hold
    pub fn core_len(&self) -> usize {
        self.char_budget * (100 - self.overlap_percent.min(100)) / 100
    }

    /// Characters of the previous piece copied ahead of each new piece
    pub fn overlap_budget(&self) -> usize {
        self.char_budget * self.overlap_percent.min(100) / 100
    }

    /// Split `text` into pieces; fails before producing anything if one sentence is too long
    pub fn chunk(&self, text: &str) -> Result<Vec<Piece>, ChunkError> {
        let sentences = self.segment_lines(text);
        let core_len = self.core_len();
        let overlap_budget = self.overlap_budget();

        // A sentence longer than half the overlap could never sit in an overlap window
        // together with a neighbour, so the midpoint hand-off would be impossible
        if let Some(oversized) = sentences.iter().find(|s| s.char_len() * 2 > overlap_budget) {
            return Err(ChunkError::PieceTooLarge {
                chars: oversized.char_len(),
                limit: overlap_budget / 2,
                preview: normalize_sentence(&oversized.text).chars().take(60).collect(),
            });
        }

        let mut pieces = Vec::new();
        let mut overlap_start = 0;
        let mut core_start = 0;
        let mut core_chars = 0;

        for (i, sentence) in sentences.iter().enumerate() {
            if i > core_start && core_chars + sentence.char_len() > core_len {
                pieces.push(build_piece(pieces.len(), text, &sentences, overlap_start, core_start, i));

                overlap_start += overlap_window_start(&sentences[overlap_start..i], overlap_budget);
                core_start = i;
                core_chars = 0;
            }
            core_chars += sentence.char_len();
        }

        if core_start < sentences.len() {
            pieces.push(build_piece(pieces.len(), text, &sentences, overlap_start, core_start, sentences.len()));
        }

        info!(
            "Chunked {} sentences into {} pieces (core {} chars, overlap {} chars)",
            sentences.len(),
            pieces.len(),
            core_len,
            overlap_budget
        );
        Ok(pieces)
    }

    /// Segment line by line, translating offsets back into document coordinates
    fn segment_lines(&self, text: &str) -> Vec<Sentence> {
        let mut sentences = Vec::new();
        let mut char_offset = 0;
        let mut byte_offset = 0;

        for line in text.split_inclusive('\n') {
            sentences.extend(
                self.segmenter
                    .segment(line)
                    .into_iter()
                    .map(|s| s.shifted(char_offset, byte_offset)),
            );
            char_offset += line.chars().count();
            byte_offset += line.len();
        }

        debug!("Segmented document into {} sentences", sentences.len());
        sentences
    }
}

fn build_piece(
    index: usize,
    text: &str,
    sentences: &[Sentence],
    overlap_start: usize,
    core_start: usize,
    end: usize,
) -> Piece {
    let first = &sentences[overlap_start];
    let last = &sentences[end - 1];

    Piece {
        index,
        source_text: text[first.start_byte..last.end_byte].to_string(),
        start_char: first.start_char,
        end_char: last.end_char,
        overlap_chars: sentences[core_start].start_char - first.start_char,
        overlap_sentences: core_start - overlap_start,
    }
}
