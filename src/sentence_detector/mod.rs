// Sentence segmentation behind the Segmenter trait.
// Sentences tile their input: concatenating every sentence text gives back the
// input exactly, so committed sentence ranges never lose whitespace.

pub mod abbreviations;
pub mod normalization;

pub use abbreviations::AbbreviationChecker;
pub use normalization::{append_comparison_key, comparison_key, normalize_sentence};

/// One sentence span over a specific text (offsets are local to that text)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    /// First character, in Unicode scalar values
    pub start_char: usize,
    /// One past the last character
    pub end_char: usize,
    pub start_byte: usize,
    pub end_byte: usize,
    /// Raw text including its trailing whitespace
    pub text: String,
}

impl Sentence {
    pub fn char_len(&self) -> usize {
        self.end_char - self.start_char
    }

    /// Move the span by the given offsets (used when lines are segmented separately)
    pub fn shifted(mut self, char_offset: usize, byte_offset: usize) -> Self {
        self.start_char += char_offset;
        self.end_char += char_offset;
        self.start_byte += byte_offset;
        self.end_byte += byte_offset;
        self
    }
}

/// Stateless segmentation service injected into the chunker and the orchestrator
pub trait Segmenter: Send + Sync {
    /// Split `text` into contiguous sentences covering every character
    fn segment(&self, text: &str) -> Vec<Sentence>;
}

/// Configuration for sentence boundary detection rules
#[derive(Debug, Clone)]
pub struct SentenceBoundaryRules {
    /// End punctuation characters that can terminate a sentence
    pub end_punctuation: Vec<char>,
    /// Closing quotes that may sit between the end punctuation and the whitespace
    pub boundary_punctuation: Vec<char>,
    /// Characters considered opening quotes
    pub opening_quotes: Vec<char>,
    /// Characters considered opening parentheticals
    pub opening_parentheticals: Vec<char>,
}

impl Default for SentenceBoundaryRules {
    fn default() -> Self {
        Self {
            end_punctuation: vec!['.', '?', '!', '\u{2026}'],
            boundary_punctuation: vec!['"', '\'', ')', '\u{201D}', '\u{2019}', '\u{00BB}'],
            opening_quotes: vec!['"', '\'', '\u{201C}', '\u{2018}', '\u{00AB}', '\u{2014}'],
            opening_parentheticals: vec!['(', '[', '{'],
        }
    }
}

/// Rule-driven segmenter
///
/// A boundary follows end punctuation (plus closing quotes) when whitespace and
/// then an uppercase letter, digit, opening quote or opening parenthetical come
/// next. Every newline ends a sentence, and the whitespace after a boundary
/// belongs to the sentence before it, up to and including the first newline.
/// Lookahead never crosses a newline, so segmenting a document line by line
/// gives the same sentences as segmenting it whole.
#[derive(Debug, Clone)]
pub struct RuleSegmenter {
    rules: SentenceBoundaryRules,
    abbreviations: AbbreviationChecker,
}

impl RuleSegmenter {
    pub fn new(rules: SentenceBoundaryRules) -> Self {
        Self {
            rules,
            abbreviations: AbbreviationChecker::new(),
        }
    }

    pub fn with_default_rules() -> Self {
        Self::new(SentenceBoundaryRules::default())
    }

    /// Char index one past the sentence ending at the punctuation at `pos`, if it ends there
    fn boundary_after(&self, text: &str, chars: &[(usize, char)], start: usize, pos: usize) -> Option<usize> {
        let len = chars.len();

        let mut next = pos + 1;
        while next < len && self.rules.boundary_punctuation.contains(&chars[next].1) {
            next += 1;
        }

        // Punctuation glued to the next word ("3.14", "e.g.") never splits
        if next >= len || !chars[next].1.is_whitespace() {
            return None;
        }

        let candidate = &text[chars[start].0..chars[next].0];
        if self.abbreviations.ends_with_title_abbreviation(candidate) {
            return None;
        }

        while next < len && chars[next].1.is_whitespace() && chars[next].1 != '\n' {
            next += 1;
        }

        if next >= len {
            return Some(len);
        }
        if chars[next].1 == '\n' {
            return Some(next + 1);
        }

        let following = chars[next].1;
        let starts_sentence = following.is_uppercase()
            || following.is_numeric()
            || self.rules.opening_quotes.contains(&following)
            || self.rules.opening_parentheticals.contains(&following);

        starts_sentence.then_some(next)
    }
}

impl Default for RuleSegmenter {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

impl Segmenter for RuleSegmenter {
    fn segment(&self, text: &str) -> Vec<Sentence> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let byte_at = |idx: usize| chars.get(idx).map_or(text.len(), |&(byte, _)| byte);

        let mut sentences = Vec::new();
        let mut start = 0;
        let mut pos = 0;

        while pos < chars.len() {
            let ch = chars[pos].1;
            let end = if ch == '\n' {
                Some(pos + 1)
            } else if self.rules.end_punctuation.contains(&ch) {
                self.boundary_after(text, &chars, start, pos)
            } else {
                None
            };

            match end {
                Some(end) => {
                    let (start_byte, end_byte) = (byte_at(start), byte_at(end));
                    sentences.push(Sentence {
                        start_char: start,
                        end_char: end,
                        start_byte,
                        end_byte,
                        text: text[start_byte..end_byte].to_string(),
                    });
                    start = end;
                    pos = end;
                }
                None => pos += 1,
            }
        }

        // Remaining text is the final sentence
        if start < chars.len() {
            let start_byte = byte_at(start);
            sentences.push(Sentence {
                start_char: start,
                end_char: chars.len(),
                start_byte,
                end_byte: text.len(),
                text: text[start_byte..].to_string(),
            });
        }

        sentences
    }
}
