//! Prompt templates. Deterministic: the same inputs always produce the same text.

use super::LlmRequest;

pub const SUMMARY_FIELD: &str = "summary";
pub const TRANSLATION_FIELD: &str = "translation";

const SUMMARY_SYSTEM: &str = "You are a careful encyclopedic editor. You summarize Wikipedia \
articles faithfully, using only facts stated in the provided text. Never invent details, \
dates or names. Write in neutral, plain English prose without headings or bullet points.";

const TRANSLATION_SYSTEM: &str = "You are a professional translator from English to \
Portuguese. Preserve every fact, name, number and date exactly. Do not add or remove \
information.";

pub fn format_instructions(field: &str) -> String {
    format!("Return only JSON with a single key \"{field}\". Example: {{\"{field}\": \"...\"}}.")
}

/// Whole article in one call.
pub fn single_pass(text: &str, word_count: usize) -> LlmRequest {
    let prompt = format!(
        "Summarize the following Wikipedia article in at most {word_count} words.\n\n\
         Article:\n{text}\n\n{}",
        format_instructions(SUMMARY_FIELD)
    );
    LlmRequest::new(SUMMARY_SYSTEM, prompt)
}

/// One segment of a long article.
pub fn map_chunk(text: &str, word_count: usize, index: usize, total: usize) -> LlmRequest {
    let prompt = format!(
        "This is part {index} of {total} of a long Wikipedia article. Summarize this part in at \
         most {word_count} words, keeping the facts most likely to matter for an overall \
         summary.\n\nPart {index}:\n{text}\n\n{}",
        format_instructions(SUMMARY_FIELD)
    );
    LlmRequest::new(SUMMARY_SYSTEM, prompt)
}

/// Combine per-segment summaries, in article order.
pub fn reduce(partials: &[String], word_count: usize) -> LlmRequest {
    let prompt = format!(
        "The following are summaries of consecutive parts of one Wikipedia article, in order. \
         Combine them into a single coherent summary of the whole article in at most \
         {word_count} words. Remove repetition.\n\nPartial summaries:\n{}\n\n{}",
        partials.join("\n\n"),
        format_instructions(SUMMARY_FIELD)
    );
    LlmRequest::new(SUMMARY_SYSTEM, prompt)
}

pub fn translation(summary: &str, word_count: usize) -> LlmRequest {
    let prompt = format!(
        "Translate the following summary into Portuguese, in at most {word_count} words.\n\n\
         Summary:\n{summary}\n\n{}",
        format_instructions(TRANSLATION_FIELD)
    );
    LlmRequest::new(TRANSLATION_SYSTEM, prompt)
}
