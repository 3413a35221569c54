//! Request-level pipeline: normalize, look up, and on a miss generate and persist.

use std::sync::Arc;

use common::{Config, SummaryConfig};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::chunking::{self, ChunkError};
use crate::fetch::{ContentFetcher, FetchError, WikipediaFetcher};
use crate::llm::chain::ModelChain;
use crate::llm::summarizer::Summarizer;
use crate::records::{NewSummary, SummaryRecord};
use crate::reference::{normalize, NormalizedReference, ReferenceError};
use crate::storage::{CacheKey, SummaryStore};
use crate::translation::Translator;

/// Where a returned record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Generated,
    Cache,
}

#[derive(Debug, Clone)]
pub struct Served {
    pub record: SummaryRecord,
    pub source: Source,
}

/// Failures that reach the caller. Model and translation failures never show up here;
/// they are absorbed into origin tags.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidReference(String),
    #[error("{0}")]
    OutOfRangeParameter(String),
    #[error("no summary found for this URL")]
    NotFound,
    #[error("{0}")]
    ContentFetchFailure(String),
    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl ServiceError {
    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::InvalidReference(_) => "invalid_reference",
            ServiceError::OutOfRangeParameter(_) => "out_of_range_parameter",
            ServiceError::NotFound => "not_found",
            ServiceError::ContentFetchFailure(_) => "content_fetch_failure",
            ServiceError::Storage(_) => "storage_failure",
        }
    }
}

impl From<ReferenceError> for ServiceError {
    fn from(err: ReferenceError) -> Self {
        ServiceError::InvalidReference(err.to_string())
    }
}

impl From<FetchError> for ServiceError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Redirect(inner) => {
                ServiceError::InvalidReference(format!("redirect rejected: {inner}"))
            }
            other => ServiceError::ContentFetchFailure(other.to_string()),
        }
    }
}

impl From<ChunkError> for ServiceError {
    fn from(err: ChunkError) -> Self {
        ServiceError::ContentFetchFailure(format!("could not extract enough article text to summarize: {err}"))
    }
}

/// Fetch, plan, summarize and translate. Stateless between calls.
pub struct Pipeline {
    fetcher: Arc<dyn ContentFetcher>,
    summarizer: Summarizer,
    translator: Translator,
    config: SummaryConfig,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        summarizer: Summarizer,
        translator: Translator,
        config: SummaryConfig,
    ) -> Self {
        Self {
            fetcher,
            summarizer,
            translator,
            config,
        }
    }

    /// Wire the live Wikipedia fetcher and, when a credential is present, the remote model
    /// chain shared by summarization and translation.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let fetcher = WikipediaFetcher::new(&config.wikipedia)?;
        let chain = ModelChain::from_config(&config.llm).map(Arc::new);
        match &chain {
            Some(_) => info!(
                model = %config.llm.model,
                fallback = config.llm.effective_fallback_model().unwrap_or("none"),
                "LLM provider initialized: remote at {}",
                config.llm.api_url
            ),
            None => warn!(
                "LLM API key env var '{}' not set or placeholder, using extractive summaries",
                config.llm.api_key_env
            ),
        }

        Ok(Self::new(
            Arc::new(fetcher),
            Summarizer::new(chain.clone(), config.summary.clone()),
            Translator::new(chain, config.translation.clone()),
            config.summary.clone(),
        ))
    }

    /// Reject lengths outside `1..=max_word_count`.
    pub fn validate_word_count(&self, word_count: i64) -> Result<usize, ServiceError> {
        let max = self.config.max_word_count;
        if word_count < 1 || word_count as u64 > max as u64 {
            return Err(ServiceError::OutOfRangeParameter(format!(
                "word_count must be between 1 and {max}"
            )));
        }
        Ok(word_count as usize)
    }

    pub async fn generate(
        &self,
        reference: &NormalizedReference,
        word_count: usize,
    ) -> Result<NewSummary, ServiceError> {
        let article = self.fetcher.fetch(reference).await.map_err(|err| {
            warn!(url = %reference, "article fetch failed: {}", err);
            ServiceError::from(err)
        })?;

        let plan = chunking::plan(&article, &self.config).map_err(|err| {
            warn!(url = %reference, "{}", err);
            ServiceError::from(err)
        })?;
        info!(
            url = %reference,
            words = plan.word_count(),
            chunks = plan.chunks().len(),
            "article planned"
        );

        let summary = self.summarizer.summarize(&plan, word_count).await;
        let translation = self.translator.translate(&summary.text, word_count).await;

        Ok(NewSummary {
            url: reference.to_string(),
            requested_word_count: word_count as i64,
            summary: summary.text,
            summary_origin: summary.origin,
            summary_translated: translation.text,
            translation_origin: translation.origin,
        })
    }
}

pub struct Orchestrator {
    store: SummaryStore,
    pipeline: Pipeline,
}

impl Orchestrator {
    pub fn new(store: SummaryStore, pipeline: Pipeline) -> Self {
        Self { store, pipeline }
    }

    pub fn store(&self) -> &SummaryStore {
        &self.store
    }

    /// Return the cached record for `(url, word_count)` or generate and persist a new one.
    pub async fn handle_create(&self, reference: &str, word_count: i64) -> Result<Served, ServiceError> {
        let reference = normalize(reference)?;
        let word_count = self.pipeline.validate_word_count(word_count)?;
        let key = CacheKey {
            reference,
            requested_word_count: word_count as i64,
        };

        if let Some(record) = self.store.find_exact(&key).await? {
            info!(url = %key.reference, word_count, id = record.id, "cache hit");
            return Ok(Served {
                record,
                source: Source::Cache,
            });
        }

        info!(url = %key.reference, word_count, "cache miss, generating summary");
        let new = self.pipeline.generate(&key.reference, word_count).await?;
        let record = self.store.put(&new).await?;
        Ok(Served {
            record,
            source: Source::Generated,
        })
    }

    /// Read-only lookup; never generates. Only non-positive lengths are rejected: records
    /// stored under an earlier, larger `max_word_count` stay reachable.
    pub async fn handle_lookup(&self, reference: &str, word_count: Option<i64>) -> Result<Served, ServiceError> {
        let reference = normalize(reference)?;
        if let Some(count) = word_count.filter(|c| *c < 1) {
            return Err(ServiceError::OutOfRangeParameter(format!(
                "word_count must be positive, got {count}"
            )));
        }

        match self.store.find_latest(&reference, word_count).await? {
            Some(record) => Ok(Served {
                record,
                source: Source::Cache,
            }),
            None => Err(ServiceError::NotFound),
        }
    }
}
