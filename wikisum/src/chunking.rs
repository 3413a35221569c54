//! Split article text into bounded segments for map-reduce summarization.

use common::SummaryConfig;
use thiserror::Error;

use crate::text::{collapse_whitespace, split_sentences};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkError {
    #[error("article text is too short to summarize ({words} words, minimum {minimum})")]
    TooShort { words: usize, minimum: usize },
}

/// Ordered, request-scoped segments of one article.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    text: String,
    word_count: usize,
    chunks: Vec<String>,
}

impl ChunkPlan {
    /// The whole article with whitespace collapsed.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    /// Fits one model call; no map-reduce needed.
    pub fn is_single(&self) -> bool {
        self.chunks.len() <= 1
    }
}

/// Plan how `article` will be summarized.
///
/// Articles below `min_article_words` fail with [`ChunkError::TooShort`]. Articles below
/// `single_pass_max_words` become a single chunk. Longer ones are packed into chunks of at
/// most `max_chunk_words`, keeping whole paragraphs together where possible, then whole
/// sentences, and only splitting inside a sentence when it alone exceeds the bound.
pub fn plan(article: &str, config: &SummaryConfig) -> Result<ChunkPlan, ChunkError> {
    let paragraphs = paragraphs(article);
    let word_count: usize = paragraphs.iter().map(|p| p.words).sum();

    if word_count < config.min_article_words {
        return Err(ChunkError::TooShort {
            words: word_count,
            minimum: config.min_article_words,
        });
    }

    let text = paragraphs
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    if word_count < config.single_pass_max_words {
        return Ok(ChunkPlan {
            chunks: vec![text.clone()],
            text,
            word_count,
        });
    }

    let max_words = config.max_chunk_words.max(1);
    let mut units: Vec<Unit> = Vec::new();
    for paragraph in paragraphs {
        if paragraph.words <= max_words {
            units.push(paragraph);
            continue;
        }
        for sentence in split_sentences(&paragraph.text) {
            let words: Vec<&str> = sentence.split_whitespace().collect();
            if words.len() <= max_words {
                units.push(Unit::new(sentence));
            } else {
                for piece in words.chunks(max_words) {
                    units.push(Unit::new(piece.join(" ")));
                }
            }
        }
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_words = 0;
    for unit in units {
        if current_words > 0 && current_words + unit.words > max_words {
            chunks.push(std::mem::take(&mut current));
            current_words = 0;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&unit.text);
        current_words += unit.words;
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    Ok(ChunkPlan {
        text,
        word_count,
        chunks,
    })
}

struct Unit {
    text: String,
    words: usize,
}

impl Unit {
    fn new(text: String) -> Self {
        let words = text.split_whitespace().count();
        Self { text, words }
    }
}

/// Blank lines separate paragraphs; everything else is collapsed.
fn paragraphs(article: &str) -> Vec<Unit> {
    let mut out = Vec::new();
    let mut buffer = String::new();
    for line in article.lines() {
        if line.trim().is_empty() {
            if !buffer.trim().is_empty() {
                out.push(Unit::new(collapse_whitespace(&buffer)));
            }
            buffer.clear();
        } else {
            buffer.push_str(line);
            buffer.push(' ');
        }
    }
    if !buffer.trim().is_empty() {
        out.push(Unit::new(collapse_whitespace(&buffer)));
    }
    out
}
