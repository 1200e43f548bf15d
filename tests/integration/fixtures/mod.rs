// Sample documents with known typos and their corrected forms

/// Multi-paragraph text with blank lines, quotes, Unicode and a few recurring typos
pub const PARAGRAPHS_TEXT: &str = "The harbour was quiet when teh boat came in. Nobody waited on the pier.
Gulls circled above teh masts. A bell rang twice in the fog.

\"Did you recieve my letter?\" she asked. He shook his head.
The letter had gone to teh wrong town. It was never found.

Perché è così difficile? Nessuno lo sa. La nave è partita all'alba.
Dr. Rossi wrote teh report by hand. It ran to forty pages.

The inspector read it twice. Then he put it in teh drawer.
Weeks passed without news. The fog came back every morning.
   An old sailor said he would recieve them all. Nobody believed him.

The boat left again in spring. It did not return.
";

/// `PARAGRAPHS_TEXT` with every typo fixed
pub fn paragraphs_corrected() -> String {
    fix_typos(PARAGRAPHS_TEXT)
}

/// Deterministic stand-in for a correction model
pub fn fix_typos(text: &str) -> String {
    text.replace("teh", "the").replace("recieve", "receive")
}

/// `count` sentences of exactly 24 characters each, on one line
pub fn numbered_document(count: usize) -> String {
    (0..count).map(|i| format!("Sentence {i:02} says hello. ")).collect()
}

/// Deterministic correction that shortens some words and lengthens others
pub fn reword(text: &str) -> String {
    text.replace("alpha", "alfa")
        .replace("delta", "d")
        .replace("eps", "epsilon")
        .replace("teh", "the")
}

const WORDS: [&str; 9] = ["alpha", "beta", "gamma", "delta", "eps", "zeta", "eta", "teh", "word"];

/// `count` numbered sentences of pseudo-random words, with line breaks and blank lines
pub fn worded_document(count: usize, seed: u64) -> String {
    let mut state = seed;
    let mut next = move |bound: u64| {
        // Knuth's MMIX LCG
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 33) % bound
    };

    let mut text = String::new();
    for i in 0..count {
        let words: Vec<&str> = (0..3).map(|_| WORDS[next(WORDS.len() as u64) as usize]).collect();
        text.push_str(&format!("S{i:03} {}.", words.join(" ")));
        text.push_str(match next(10) {
            0 => "\n\n",
            1 | 2 => "\n",
            _ => " ",
        });
    }
    text
}
