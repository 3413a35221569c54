//! Best-effort Portuguese translation of a finished summary.
//!
//! There is no error type here on purpose: every path ends in a [`TranslationOutcome`].

use std::sync::Arc;

use common::TranslationConfig;
use tracing::{info, warn};

use crate::llm::chain::{ModelChain, ModelTier};
use crate::llm::parse::ParsedOutput;
use crate::llm::prompts::{self, TRANSLATION_FIELD};
use crate::records::TranslationOrigin;
use crate::text::{collapse_whitespace, truncate_to_word_limit};

const STOPWORDS: &[&str] = &[
    "os", "as", "um", "uma", "uns", "umas", "de", "do", "da", "dos", "das", "em", "no", "na",
    "nos", "nas", "por", "para", "com", "que", "como", "ou", "não", "mais", "menos", "já", "há",
    "se", "sua", "seu", "suas", "seus", "entre", "ao", "às", "aos", "sobre", "também", "foi",
    "era", "ser", "são", "está", "estão", "tem", "têm", "pelo", "pela", "pelos", "pelas",
];

const MIN_CHARS: usize = 40;
const MIN_WORDS: usize = 5;
const MIN_HITS: usize = 3;
const MIN_RATIO: f64 = 0.08;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationOutcome {
    pub text: Option<String>,
    pub origin: TranslationOrigin,
}

impl TranslationOutcome {
    fn empty(origin: TranslationOrigin) -> Self {
        Self { text: None, origin }
    }
}

pub struct Translator {
    chain: Option<Arc<ModelChain>>,
    config: TranslationConfig,
}

impl Translator {
    pub fn new(chain: Option<Arc<ModelChain>>, config: TranslationConfig) -> Self {
        Self { chain, config }
    }

    pub async fn translate(&self, summary: &str, word_count: usize) -> TranslationOutcome {
        if !self.config.enabled {
            info!("Portuguese translation disabled by configuration");
            return TranslationOutcome::empty(TranslationOrigin::Disabled);
        }

        if looks_like_portuguese(summary) {
            return TranslationOutcome {
                text: Some(summary.to_string()),
                origin: TranslationOrigin::Skipped,
            };
        }

        let Some(chain) = self.chain.as_deref() else {
            warn!("No LLM credential configured, skipping translation");
            return TranslationOutcome::empty(TranslationOrigin::Unavailable);
        };

        let request = prompts::translation(summary, word_count);
        match chain.invoke("translation", &request).await {
            Ok(success) => {
                let parsed = ParsedOutput::parse(&success.content);
                if !parsed.is_structured() {
                    warn!("LLM output missing JSON field '{}', using raw text", TRANSLATION_FIELD);
                }
                let text = parsed.text_field(TRANSLATION_FIELD, &success.content);
                TranslationOutcome {
                    text: Some(truncate_to_word_limit(&text, word_count)),
                    origin: match success.tier {
                        ModelTier::Primary => TranslationOrigin::PrimaryModel,
                        ModelTier::Secondary => TranslationOrigin::FallbackModel,
                    },
                }
            }
            Err(err) => {
                warn!("LLM translation failed: {}", err);
                TranslationOutcome::empty(TranslationOrigin::Error)
            }
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphabetic() || "áàâãéêíóôõúç".contains(c)
}

/// Conservative lexical check: only says yes when Portuguese function words are frequent.
pub fn looks_like_portuguese(text: &str) -> bool {
    let cleaned = collapse_whitespace(text).to_lowercase();
    if cleaned.chars().count() < MIN_CHARS {
        return false;
    }

    let words: Vec<&str> = cleaned
        .split(|c: char| !is_word_char(c))
        .filter(|w| !w.is_empty())
        .collect();
    if words.len() < MIN_WORDS {
        return false;
    }

    let hits = words.iter().filter(|w| STOPWORDS.contains(*w)).count();
    let ratio = hits as f64 / words.len() as f64;
    hits >= MIN_HITS && ratio >= MIN_RATIO
}
