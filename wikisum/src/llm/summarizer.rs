// Summarizer module
use std::sync::Arc;

use common::SummaryConfig;
use tracing::{info, warn};

use super::chain::{ModelChain, ModelTier};
use super::parse::ParsedOutput;
use super::prompts::{self, SUMMARY_FIELD};
use crate::chunking::ChunkPlan;
use crate::records::SummaryOrigin;
use crate::text::{collapse_whitespace, split_sentences, truncate_to_word_limit};

const EXTRACTIVE_SENTENCES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryOutcome {
    pub text: String,
    pub origin: SummaryOrigin,
}

/// Produces a summary for a planned article. Never fails: when every model tier is
/// exhausted, or no model is configured, the extractive summarizer takes over.
pub struct Summarizer {
    chain: Option<Arc<ModelChain>>,
    config: SummaryConfig,
}

impl Summarizer {
    pub fn new(chain: Option<Arc<ModelChain>>, config: SummaryConfig) -> Self {
        Self { chain, config }
    }

    pub fn has_model(&self) -> bool {
        self.chain.is_some()
    }

    pub async fn summarize(&self, plan: &ChunkPlan, word_count: usize) -> SummaryOutcome {
        let Some(chain) = self.chain.as_deref() else {
            warn!("No LLM credential configured, using extractive summary");
            return extractive(plan.text(), word_count);
        };

        if plan.is_single() {
            self.single_pass(chain, plan, word_count).await
        } else {
            self.map_reduce(chain, plan, word_count).await
        }
    }

    async fn single_pass(&self, chain: &ModelChain, plan: &ChunkPlan, word_count: usize) -> SummaryOutcome {
        let request = prompts::single_pass(plan.text(), word_count);
        match chain.invoke("summary", &request).await {
            Ok(success) => {
                let text = summary_text(&success.content, "summary");
                info!(words = plan.word_count(), tier = %success.tier, "LLM summarization successful");
                SummaryOutcome {
                    text: truncate_to_word_limit(&text, word_count),
                    origin: origin_for(success.tier),
                }
            }
            Err(err) => {
                warn!("LLM summarization failed: {}, falling back to extractive summary", err);
                extractive(plan.text(), word_count)
            }
        }
    }

    async fn map_reduce(&self, chain: &ModelChain, plan: &ChunkPlan, word_count: usize) -> SummaryOutcome {
        let total = plan.chunks().len();
        let target = self.map_target(word_count, total);
        let mut used_secondary = false;
        let mut partials = Vec::with_capacity(total);

        for (index, chunk) in plan.chunks().iter().enumerate() {
            let request = prompts::map_chunk(chunk, target, index + 1, total);
            match chain.invoke("summary-map", &request).await {
                Ok(success) => {
                    used_secondary |= success.tier == ModelTier::Secondary;
                    let text = summary_text(&success.content, "summary-map");
                    partials.push(truncate_to_word_limit(&text, target));
                }
                Err(err) => {
                    warn!(chunk = index + 1, total, "Map step failed: {}, using extractive partial", err);
                    partials.push(extractive(chunk, target).text);
                }
            }
        }

        let request = prompts::reduce(&partials, word_count);
        match chain.invoke("summary-reduce", &request).await {
            Ok(success) => {
                used_secondary |= success.tier == ModelTier::Secondary;
                let text = summary_text(&success.content, "summary-reduce");
                info!(chunks = total, words = plan.word_count(), "Map-reduce summarization successful");
                SummaryOutcome {
                    text: truncate_to_word_limit(&text, word_count),
                    origin: if used_secondary {
                        SummaryOrigin::FallbackModel
                    } else {
                        SummaryOrigin::PrimaryModel
                    },
                }
            }
            Err(err) => {
                warn!("Reduce step failed: {}, falling back to extractive summary", err);
                extractive(plan.text(), word_count)
            }
        }
    }

    /// Per-chunk word budget: 1.5x the proportional share, clamped to the configured range.
    pub fn map_target(&self, word_count: usize, chunk_count: usize) -> usize {
        if chunk_count == 0 {
            return word_count;
        }
        let share = (word_count as f64 * 1.5 / chunk_count as f64) as usize;
        share
            .max(self.config.map_min_summary_words)
            .min(self.config.map_max_summary_words)
    }
}

fn origin_for(tier: ModelTier) -> SummaryOrigin {
    match tier {
        ModelTier::Primary => SummaryOrigin::PrimaryModel,
        ModelTier::Secondary => SummaryOrigin::FallbackModel,
    }
}

fn summary_text(raw: &str, purpose: &str) -> String {
    let parsed = ParsedOutput::parse(raw);
    if !parsed.is_structured() {
        warn!(purpose, "LLM output missing JSON field '{}', using raw text", SUMMARY_FIELD);
    }
    parsed.text_field(SUMMARY_FIELD, raw)
}

/// Leading-sentence summary, used when no model could produce one.
pub fn extractive(text: &str, word_count: usize) -> SummaryOutcome {
    let cleaned = collapse_whitespace(text);
    let lead = split_sentences(&cleaned)
        .into_iter()
        .take(EXTRACTIVE_SENTENCES)
        .collect::<Vec<_>>()
        .join(" ");

    SummaryOutcome {
        text: truncate_to_word_limit(&lead, word_count),
        origin: SummaryOrigin::Extractive,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking;
    use crate::llm::chain::testing::{instant_policy, ScriptedProvider};
    use crate::llm::LlmError;

    fn config() -> SummaryConfig {
        SummaryConfig {
            min_article_words: 10,
            single_pass_max_words: 100,
            max_chunk_words: 60,
            ..SummaryConfig::default()
        }
    }

    fn article(paragraphs: usize) -> String {
        (0..paragraphs)
            .map(|p| {
                (0..5)
                    .map(|s| format!("Paragraph {p} sentence {s} has exactly eight words."))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn summarizer(primary: Arc<ScriptedProvider>, secondary: Option<Arc<ScriptedProvider>>) -> Summarizer {
        let mut chain = ModelChain::new(primary, instant_policy(1));
        if let Some(secondary) = secondary {
            chain = chain.with_secondary(secondary);
        }
        Summarizer::new(Some(Arc::new(chain)), config())
    }

    #[test]
    fn extractive_takes_leading_sentences() {
        let text = "First sentence is the headline. Second sentence is a bullet. \
                    Third sentence is another bullet. Fourth is yet another. \
                    Fifth sentence here. Sixth and final.";

        let summary = extractive(text, 100);

        assert_eq!(summary.origin, SummaryOrigin::Extractive);
        assert!(summary.text.starts_with("First sentence is the headline."));
        assert!(summary.text.ends_with("Fifth sentence here."));
        assert!(!summary.text.contains("Sixth"));
    }

    #[test]
    fn extractive_respects_word_limit() {
        let summary = extractive(&article(2), 12);
        assert!(summary.text.split_whitespace().count() <= 12);
        assert!(summary.text.ends_with('.'));
    }

    #[test]
    fn map_target_is_clamped() {
        let s = Summarizer::new(None, config());
        assert_eq!(s.map_target(100, 2), 75);
        assert_eq!(s.map_target(100, 10), 60);
        assert_eq!(s.map_target(500, 2), 200);
    }

    #[tokio::test]
    async fn single_chunk_uses_one_call() {
        let primary = Arc::new(ScriptedProvider::always("primary", r#"{"summary": "Short model summary."}"#));
        let s = summarizer(primary.clone(), None);
        let plan = chunking::plan(&article(1), &config()).unwrap();
        assert!(plan.is_single());

        let outcome = s.summarize(&plan, 50).await;

        assert_eq!(outcome.text, "Short model summary.");
        assert_eq!(outcome.origin, SummaryOrigin::PrimaryModel);
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test]
    async fn long_article_maps_then_reduces() {
        let primary = Arc::new(ScriptedProvider::always("primary", r#"{"summary": "Partial."}"#));
        let s = summarizer(primary.clone(), None);
        let plan = chunking::plan(&article(4), &config()).unwrap();
        let chunks = plan.chunks().len();
        assert!(chunks > 1);

        let outcome = s.summarize(&plan, 50).await;

        assert_eq!(outcome.origin, SummaryOrigin::PrimaryModel);
        assert_eq!(primary.calls(), chunks + 1);
        let prompts = primary.prompts.lock().unwrap();
        assert!(prompts[0].contains(&format!("part 1 of {chunks}")));
        assert!(prompts.last().unwrap().contains("Partial summaries"));
    }

    #[tokio::test]
    async fn secondary_tier_marks_fallback_origin() {
        let primary = Arc::new(ScriptedProvider::new(
            "primary",
            vec![Err(LlmError::Config("model not found".into()))],
        ));
        let secondary = Arc::new(ScriptedProvider::always("secondary", r#"{"summary": "From backup."}"#));
        let s = summarizer(primary, Some(secondary));
        let plan = chunking::plan(&article(1), &config()).unwrap();

        let outcome = s.summarize(&plan, 50).await;

        assert_eq!(outcome.text, "From backup.");
        assert_eq!(outcome.origin, SummaryOrigin::FallbackModel);
    }

    #[tokio::test]
    async fn failed_map_step_uses_extractive_partial() {
        // Primary fails the first chunk twice (both attempts), then succeeds for the rest
        let primary = Arc::new(
            ScriptedProvider::new(
                "primary",
                vec![
                    Err(LlmError::Transport("reset".into())),
                    Err(LlmError::Transport("reset".into())),
                ],
            )
            .with_fallback(r#"{"summary": "Combined."}"#),
        );
        let s = summarizer(primary.clone(), None);
        let plan = chunking::plan(&article(4), &config()).unwrap();

        let outcome = s.summarize(&plan, 50).await;

        assert_eq!(outcome.origin, SummaryOrigin::PrimaryModel);
        let prompts = primary.prompts.lock().unwrap();
        let reduce = prompts.last().unwrap();
        assert!(reduce.contains("Paragraph 0 sentence 0"));
    }

    #[tokio::test]
    async fn exhausted_chain_falls_back_to_extractive() {
        let primary = Arc::new(ScriptedProvider::failing("primary"));
        let secondary = Arc::new(ScriptedProvider::failing("secondary"));
        let s = summarizer(primary, Some(secondary));
        let plan = chunking::plan(&article(4), &config()).unwrap();

        let outcome = s.summarize(&plan, 30).await;

        assert_eq!(outcome.origin, SummaryOrigin::Extractive);
        assert!(outcome.text.starts_with("Paragraph 0 sentence 0"));
    }

    #[tokio::test]
    async fn without_model_goes_extractive() {
        let s = Summarizer::new(None, config());
        let plan = chunking::plan(&article(1), &config()).unwrap();
        let outcome = s.summarize(&plan, 20).await;
        assert_eq!(outcome.origin, SummaryOrigin::Extractive);
        assert!(!s.has_model());
    }

    #[tokio::test]
    async fn model_summary_is_truncated() {
        let long = (0..80).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let primary = Arc::new(ScriptedProvider::always("primary", &format!(r#"{{"summary": "{long}"}}"#)));
        let s = summarizer(primary, None);
        let plan = chunking::plan(&article(1), &config()).unwrap();

        let outcome = s.summarize(&plan, 25).await;

        assert_eq!(outcome.text.split_whitespace().count(), 25);
    }
}
