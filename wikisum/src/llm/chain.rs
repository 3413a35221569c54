//! Retry and fallback across a primary and an optional secondary model.
//!
//! ```text
//! Idle -> Trying(primary, 1..=N) -> Done
//!                 | exhausted / fatal
//!                 v
//!         Trying(secondary, 1..=M) -> Done
//!                 | exhausted / fatal
//!                 v
//!               Failed
//! ```
//!
//! Dropping the future returned by [`ModelChain::invoke`] cancels it, including any
//! pending backoff sleep.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::LlmConfig;
use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

use super::remote::RemoteLlmProvider;
use super::{LlmError, LlmProvider, LlmRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Primary,
    Secondary,
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelTier::Primary => f.write_str("primary"),
            ModelTier::Secondary => f.write_str("secondary"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    /// The provider answered, but with an error or unusable payload
    StructuredFailure,
    /// Timeout or connection failure
    TransportFailure,
}

/// Audit record of one call. Not persisted.
#[derive(Debug, Clone)]
pub struct ModelAttempt {
    pub tier: ModelTier,
    pub model: String,
    pub attempt: u32,
    pub elapsed: Duration,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt, per tier
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_backoff: Duration::from_millis(config.retry_backoff_ms),
            jitter: config.retry_jitter,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay after failed attempt `attempt` (1-based): `base * 2^(attempt-1)`, optionally
    /// scaled by a factor in [0.8, 1.2). Still strictly growing with jitter on.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.base_backoff.saturating_mul(1u32 << exp);
        if self.jitter && !delay.is_zero() {
            let factor = rand::thread_rng().gen_range(0.8..1.2);
            delay.mul_f64(factor)
        } else {
            delay
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChainSuccess {
    pub content: String,
    pub tier: ModelTier,
    pub model: String,
    pub attempts: Vec<ModelAttempt>,
}

#[derive(Debug, Error)]
#[error("all model tiers failed after {} attempts", attempts.len())]
pub struct AllModelsFailed {
    pub attempts: Vec<ModelAttempt>,
    pub last_error: Option<String>,
}

struct TierSlot {
    tier: ModelTier,
    provider: Arc<dyn LlmProvider>,
}

enum ChainState {
    Idle,
    Trying { slot: usize, attempt: u32 },
    Done(ChainSuccess),
    Failed,
}

/// Runs one logical model request against the configured tiers.
pub struct ModelChain {
    tiers: Vec<TierSlot>,
    policy: RetryPolicy,
}

impl ModelChain {
    pub fn new(primary: Arc<dyn LlmProvider>, policy: RetryPolicy) -> Self {
        Self {
            tiers: vec![TierSlot {
                tier: ModelTier::Primary,
                provider: primary,
            }],
            policy,
        }
    }

    pub fn with_secondary(mut self, secondary: Arc<dyn LlmProvider>) -> Self {
        self.tiers.truncate(1);
        self.tiers.push(TierSlot {
            tier: ModelTier::Secondary,
            provider: secondary,
        });
        self
    }

    /// Build the remote chain from configuration. `None` when no usable API key is set,
    /// which callers treat as "model unavailable".
    pub fn from_config(config: &LlmConfig) -> Option<Self> {
        let api_key = config.api_key()?;
        let primary = RemoteLlmProvider::from_config(config, &api_key, &config.model);
        let mut chain = Self::new(Arc::new(primary), RetryPolicy::from_config(config));
        if let Some(fallback) = config.effective_fallback_model() {
            let secondary = RemoteLlmProvider::from_config(config, &api_key, fallback);
            chain = chain.with_secondary(Arc::new(secondary));
        }
        Some(chain)
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Try each tier in order with its own retry budget. Retryable failures back off and
    /// retry the same tier; fatal ones move straight to the next tier.
    pub async fn invoke(
        &self,
        purpose: &str,
        request: &LlmRequest,
    ) -> Result<ChainSuccess, AllModelsFailed> {
        let prompt_hash = prompt_fingerprint(request);
        let mut attempts: Vec<ModelAttempt> = Vec::new();
        let mut last_error: Option<String> = None;
        let mut state = ChainState::Idle;

        loop {
            state = match state {
                ChainState::Idle => {
                    if self.tiers.is_empty() {
                        ChainState::Failed
                    } else {
                        ChainState::Trying { slot: 0, attempt: 1 }
                    }
                }
                ChainState::Trying { slot, attempt } => {
                    let TierSlot { tier, provider } = &self.tiers[slot];
                    let started = Instant::now();
                    let result = provider.generate(request.clone()).await;
                    let elapsed = started.elapsed();

                    match result {
                        Ok(response) => {
                            info!(
                                purpose,
                                tier = %tier,
                                model = provider.model(),
                                attempt,
                                elapsed_ms = elapsed.as_millis() as u64,
                                prompt_hash = %prompt_hash,
                                "LLM call succeeded"
                            );
                            attempts.push(ModelAttempt {
                                tier: *tier,
                                model: provider.model().to_string(),
                                attempt,
                                elapsed,
                                outcome: AttemptOutcome::Success,
                            });
                            ChainState::Done(ChainSuccess {
                                content: response.content,
                                tier: *tier,
                                model: provider.model().to_string(),
                                attempts: std::mem::take(&mut attempts),
                            })
                        }
                        Err(err) => {
                            let retryable = err.is_retryable();
                            warn!(
                                purpose,
                                tier = %tier,
                                model = provider.model(),
                                attempt,
                                elapsed_ms = elapsed.as_millis() as u64,
                                prompt_hash = %prompt_hash,
                                retryable,
                                error = %err,
                                "LLM call failed"
                            );
                            attempts.push(ModelAttempt {
                                tier: *tier,
                                model: provider.model().to_string(),
                                attempt,
                                elapsed,
                                outcome: outcome_of(&err),
                            });
                            last_error = Some(err.to_string());

                            if retryable && attempt < self.policy.max_attempts() {
                                tokio::time::sleep(self.policy.backoff(attempt)).await;
                                ChainState::Trying {
                                    slot,
                                    attempt: attempt + 1,
                                }
                            } else if slot + 1 < self.tiers.len() {
                                warn!(purpose, next = %self.tiers[slot + 1].tier, "moving to next model tier");
                                ChainState::Trying {
                                    slot: slot + 1,
                                    attempt: 1,
                                }
                            } else {
                                ChainState::Failed
                            }
                        }
                    }
                }
                ChainState::Done(success) => return Ok(success),
                ChainState::Failed => {
                    warn!(purpose, attempts = attempts.len(), prompt_hash = %prompt_hash, "all model tiers failed");
                    return Err(AllModelsFailed {
                        attempts,
                        last_error,
                    });
                }
            };
        }
    }
}

fn outcome_of(err: &LlmError) -> AttemptOutcome {
    if err.is_transport() {
        AttemptOutcome::TransportFailure
    } else {
        AttemptOutcome::StructuredFailure
    }
}

/// Short SHA-256 of the prompt text, logged instead of the payload itself.
pub fn prompt_fingerprint(request: &LlmRequest) -> String {
    let mut hasher = Sha256::new();
    if let Some(system) = &request.system {
        hasher.update(system.as_bytes());
        hasher.update(b"\n");
    }
    hasher.update(request.prompt.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..12].to_string()
}
