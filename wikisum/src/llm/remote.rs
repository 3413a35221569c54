use std::time::Duration;

use common::LlmConfig;
use serde::{Deserialize, Serialize};

use super::{LlmError, LlmProvider, LlmRequest, LlmResponse, UsageMetadata};

/// Remote LLM provider using OpenAI-compatible HTTP API
pub struct RemoteLlmProvider {
    base_url: String,
    api_key: String,
    model: String,
    default_timeout: Duration,
    default_max_tokens: usize,
    default_temperature: f32,
    client: reqwest::Client,
}

impl RemoteLlmProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            default_timeout: Duration::from_secs(30),
            default_max_tokens: 1024,
            default_temperature: 0.0,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_defaults(
        mut self,
        timeout_secs: u64,
        max_tokens: usize,
        temperature: f32,
    ) -> Self {
        self.default_timeout = Duration::from_secs(timeout_secs);
        self.default_max_tokens = max_tokens;
        self.default_temperature = temperature;
        self
    }

    /// Provider for `model` using the endpoint, key and limits in `config`.
    pub fn from_config(config: &LlmConfig, api_key: &str, model: &str) -> Self {
        Self::new(&config.api_url, api_key, model).with_defaults(
            config.timeout_seconds,
            config.max_tokens,
            config.temperature,
        )
    }
}

#[async_trait::async_trait]
impl LlmProvider for RemoteLlmProvider {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let timeout = request
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let max_tokens = request.max_tokens.unwrap_or(self.default_max_tokens);
        let temperature = request.temperature.unwrap_or(self.default_temperature);

        // Build OpenAI-compatible request
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system {
            messages.push(Message {
                role: "system".to_string(),
                content: Some(system),
            });
        }
        messages.push(Message {
            role: "user".to_string(),
            content: Some(request.prompt),
        });

        let req_body = OpenAiRequest {
            model: self.model.clone(),
            messages,
            max_tokens: Some(max_tokens),
            temperature: Some(temperature),
        };

        // Make HTTP request with timeout
        let response = tokio::time::timeout(
            timeout,
            self.client
                .post(&self.base_url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&req_body)
                .send(),
        )
        .await
        .map_err(|_| LlmError::Timeout(timeout))?
        .map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(timeout)
            } else {
                LlmError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => LlmError::Unauthorized {
                    status: status.as_u16(),
                    body,
                },
                429 => LlmError::RateLimited(body),
                code => LlmError::Api { status: code, body },
            });
        }

        let resp_body: OpenAiResponse = tokio::time::timeout(timeout, response.json())
            .await
            .map_err(|_| LlmError::Timeout(timeout))?
            .map_err(|e| LlmError::Malformed(e.to_string()))?;

        let choice = resp_body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Malformed("LLM response has no choices".to_string()))?;

        let content = choice.message.content.unwrap_or_default();
        if content.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        let usage = resp_body
            .usage
            .map(|u| UsageMetadata {
                prompt_tokens: u.prompt_tokens.unwrap_or(0),
                completion_tokens: u.completion_tokens.unwrap_or(0),
                total_tokens: u.total_tokens.unwrap_or(0),
            })
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            usage,
            model: resp_body.model.unwrap_or_else(|| self.model.clone()),
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// OpenAI API request/response structures
#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    model: Option<String>,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: Option<usize>,
    #[serde(default)]
    completion_tokens: Option<usize>,
    #[serde(default)]
    total_tokens: Option<usize>,
}
