// Normalization used when sentences are compared or displayed, never when they are written.
// Committed output always comes from the raw sentence text.

/// Collapse every whitespace run (including \r\n and blank lines) into a single space and trim
pub fn normalize_sentence(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    append_normalized(text, &mut result, false);
    result
}

/// Comparison key of a single sentence: normalized and lowercased
pub fn comparison_key(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    append_comparison_key(text, &mut result);
    result
}

/// Append the comparison key of `text` to `buffer` without clearing it
/// WHY: the aligner builds keys for whole sentence spans in one buffer
pub fn append_comparison_key(text: &str, buffer: &mut String) {
    append_normalized(text, buffer, true);
}

fn append_normalized(text: &str, buffer: &mut String, lowercase: bool) {
    buffer.reserve(text.len());

    // Leading whitespace is dropped, interior runs become one space
    let mut pending_space = false;
    let mut wrote_any = false;

    for ch in text.chars() {
        if ch.is_whitespace() {
            pending_space = wrote_any;
            continue;
        }
        if pending_space {
            buffer.push(' ');
            pending_space = false;
        }
        if lowercase {
            buffer.extend(ch.to_lowercase());
        } else {
            buffer.push(ch);
        }
        wrote_any = true;
    }
}
