//! Text normalisation and keyword extraction shared by the registry and the
//! search engine.

/// A character survives normalisation if it is Latin alphanumeric, an
/// underscore, or lowercase Cyrillic. Everything else becomes a space.
fn keep(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || ('а'..='я').contains(&c) || c == 'ё'
}

/// Lowercase, replace punctuation with spaces, collapse whitespace, trim.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_space = false;
    for c in lowered.chars() {
        if keep(c) {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }
    out
}

/// Normalise and split into tokens, dropping tokens shorter than `min_len`
/// characters.
pub fn tokenize(text: &str, min_len: usize) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .filter(|w| w.chars().count() >= min_len)
        .map(str::to_string)
        .collect()
}

/// Derive lexical keywords from a tool name and optional description.
///
/// Includes the lowercased whole name, every `_`/`-` separated piece of at
/// least two characters, and the description tokens of at least four
/// characters. Duplicates are dropped; order follows first occurrence.
pub fn extract_keywords(name: &str, description: Option<&str>) -> Vec<String> {
    let mut keywords = Vec::new();
    let mut push = |word: String| {
        if !word.is_empty() && !keywords.contains(&word) {
            keywords.push(word);
        }
    };

    push(name.to_lowercase());
    for piece in name.to_lowercase().split(['_', '-']) {
        if piece.chars().count() >= 2 {
            push(piece.to_string());
        }
    }
    if let Some(desc) = description {
        for token in tokenize(desc, 4) {
            push(token);
        }
    }
    keywords
}
