// Title abbreviations that would otherwise end a sentence before a proper noun,
// e.g. "Dr. Smith" or "Sig. Rossi".

use std::collections::HashSet;

/// First half of two-part names like "Dr. Smith", "Mr. Johnson", "Dott. Bianchi"
pub const TITLE_ABBREVIATIONS: &[&str] = &[
    "Dr.", "Mr.", "Mrs.", "Ms.", "Prof.", "Sr.", "Jr.", "St.",
    "Sig.", "Sig.ra", "Dott.", "Dott.ssa", "Avv.", "Ing.",
];

/// HashSet-backed lookup of title abbreviations
#[derive(Debug, Clone)]
pub struct AbbreviationChecker {
    title_abbreviations: HashSet<&'static str>,
}

impl AbbreviationChecker {
    pub fn new() -> Self {
        Self {
            title_abbreviations: TITLE_ABBREVIATIONS.iter().copied().collect(),
        }
    }

    pub fn is_title_abbreviation(&self, word: &str) -> bool {
        self.title_abbreviations.contains(word)
    }

    /// Check whether the last word of `text` is a title abbreviation
    /// Surrounding quotes and opening brackets are ignored.
    pub fn ends_with_title_abbreviation(&self, text: &str) -> bool {
        match text.split_whitespace().last() {
            Some(last_word) => {
                let clean_word = last_word.trim_start_matches(|c: char| {
                    matches!(c, '"' | '\'' | '(' | '[' | '\u{201C}' | '\u{2018}' | '\u{00AB}')
                });
                self.is_title_abbreviation(clean_word)
            }
            None => false,
        }
    }
}

impl Default for AbbreviationChecker {
    fn default() -> Self {
        Self::new()
    }
}
