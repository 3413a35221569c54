use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which tier produced the stored summary text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryOrigin {
    PrimaryModel,
    FallbackModel,
    Extractive,
}

/// Which tier produced the translation, or why there is none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TranslationOrigin {
    PrimaryModel,
    FallbackModel,
    /// Summary already looked Portuguese; reused verbatim
    Skipped,
    Disabled,
    /// No model credential configured
    Unavailable,
    Error,
}

impl SummaryOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryOrigin::PrimaryModel => "primary-model",
            SummaryOrigin::FallbackModel => "fallback-model",
            SummaryOrigin::Extractive => "extractive",
        }
    }
}

impl TranslationOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranslationOrigin::PrimaryModel => "primary-model",
            TranslationOrigin::FallbackModel => "fallback-model",
            TranslationOrigin::Skipped => "skipped",
            TranslationOrigin::Disabled => "disabled",
            TranslationOrigin::Unavailable => "unavailable",
            TranslationOrigin::Error => "error",
        }
    }
}

impl fmt::Display for SummaryOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TranslationOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryOrigin {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary-model" => Ok(SummaryOrigin::PrimaryModel),
            "fallback-model" => Ok(SummaryOrigin::FallbackModel),
            "extractive" => Ok(SummaryOrigin::Extractive),
            other => anyhow::bail!("unknown summary origin '{}'", other),
        }
    }
}

impl FromStr for TranslationOrigin {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary-model" => Ok(TranslationOrigin::PrimaryModel),
            "fallback-model" => Ok(TranslationOrigin::FallbackModel),
            "skipped" => Ok(TranslationOrigin::Skipped),
            "disabled" => Ok(TranslationOrigin::Disabled),
            "unavailable" => Ok(TranslationOrigin::Unavailable),
            "error" => Ok(TranslationOrigin::Error),
            other => anyhow::bail!("unknown translation origin '{}'", other),
        }
    }
}

/// One persisted generation result. Never updated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub id: i64,
    pub url: String,
    pub requested_word_count: i64,
    pub actual_word_count: i64,
    pub summary: String,
    pub summary_origin: SummaryOrigin,
    pub summary_translated: Option<String>,
    pub translation_origin: TranslationOrigin,
    pub created_at: DateTime<Utc>,
}

/// Fields of a record before the store assigns `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewSummary {
    pub url: String,
    pub requested_word_count: i64,
    pub summary: String,
    pub summary_origin: SummaryOrigin,
    pub summary_translated: Option<String>,
    pub translation_origin: TranslationOrigin,
}

impl NewSummary {
    /// Measured from the text, so it can differ from what was requested.
    pub fn actual_word_count(&self) -> i64 {
        word_count(&self.summary) as i64
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_round_trip_through_their_storage_form() {
        for origin in [
            SummaryOrigin::PrimaryModel,
            SummaryOrigin::FallbackModel,
            SummaryOrigin::Extractive,
        ] {
            assert_eq!(origin.as_str().parse::<SummaryOrigin>().unwrap(), origin);
            assert_eq!(
                serde_json::to_value(origin).unwrap(),
                serde_json::Value::String(origin.as_str().to_string())
            );
        }
        assert_eq!("skipped".parse::<TranslationOrigin>().unwrap(), TranslationOrigin::Skipped);
        assert!("llm".parse::<TranslationOrigin>().is_err());
    }
}
