//! Word and sentence helpers shared by the planner, the summarizer and translation.

/// Collapse every whitespace run into a single space.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn ends_sentence(word: &str) -> bool {
    word.trim_end_matches(['"', '\'', ')', ']', '»', '”'])
        .ends_with(['.', '!', '?'])
}

/// Split on whitespace that follows `.`, `!` or `?`.
/// Joining the result with single spaces gives back the collapsed input.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for word in text.split_whitespace() {
        current.push(word);
        if ends_sentence(word) {
            sentences.push(current.join(" "));
            current.clear();
        }
    }
    if !current.is_empty() {
        sentences.push(current.join(" "));
    }
    sentences
}

/// Trim `text` to at most `max_words`, preferring to cut at a sentence boundary when that
/// keeps at least 60% of the budget. The result always ends with terminal punctuation.
pub fn truncate_to_word_limit(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return words.join(" ");
    }

    let mut truncated = words[..max_words].join(" ");

    let sentences = split_sentences(&truncated);
    if sentences.len() > 1 {
        let candidate = sentences[..sentences.len() - 1].join(" ");
        let floor = ((max_words as f64 * 0.6) as usize).max(1);
        if candidate.split_whitespace().count() >= floor {
            truncated = candidate;
        }
    }

    let mut truncated = truncated
        .trim_end_matches([' ', ',', ';', ':', '-'])
        .to_string();
    if !truncated.ends_with(['.', '!', '?']) {
        truncated.push('.');
    }
    truncated
}
