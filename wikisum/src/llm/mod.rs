use std::time::Duration;

use thiserror::Error;

pub mod chain;
pub mod parse;
pub mod prompts;
pub mod remote;
pub mod summarizer;

/// Core trait for LLM providers. One implementation per model.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate completion for a given prompt
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Model identifier, used in audit logs
    fn model(&self) -> &str;
}

/// Request structure for LLM generation
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub timeout_seconds: Option<u64>,
}

impl LlmRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            prompt: prompt.into(),
            max_tokens: None,
            temperature: None,
            timeout_seconds: None,
        }
    }
}

/// Response from LLM generation
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: UsageMetadata,
    pub model: String,
}

/// Token usage metadata
#[derive(Debug, Clone, Default)]
pub struct UsageMetadata {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Provider failures, split into transient (worth retrying) and fatal ones.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request timed out after {0:?}")]
    Timeout(Duration),
    #[error("LLM HTTP request failed: {0}")]
    Transport(String),
    #[error("LLM rate limited (429): {0}")]
    RateLimited(String),
    #[error("LLM authentication failed ({status}): {body}")]
    Unauthorized { status: u16, body: String },
    #[error("LLM API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("LLM configuration error: {0}")]
    Config(String),
    #[error("LLM returned an empty response")]
    EmptyResponse,
    #[error("failed to parse LLM response: {0}")]
    Malformed(String),
}

impl LlmError {
    /// Timeouts, transport errors, rate limits, 5xx and garbled responses are retried;
    /// authentication and other request/configuration errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Timeout(_)
            | LlmError::Transport(_)
            | LlmError::RateLimited(_)
            | LlmError::EmptyResponse
            | LlmError::Malformed(_) => true,
            LlmError::Api { status, .. } => *status >= 500 || *status == 408,
            LlmError::Unauthorized { .. } | LlmError::Config(_) => false,
        }
    }

    /// True when the call never produced an HTTP response.
    pub fn is_transport(&self) -> bool {
        matches!(self, LlmError::Timeout(_) | LlmError::Transport(_))
    }
}
