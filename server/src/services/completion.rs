//! Chat-completion client for the OpenRouter API and the failover loop over
//! the configured API keys.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::{AiConfig, Secret};
use crate::error::{Result, WardrobeError};

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API request failed with status {0}")]
    Status(u16),

    #[error("rate limited after {0} attempts")]
    RateLimited(u32),

    #[error("unexpected API response structure: {0}")]
    MalformedResponse(String),
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, api_key: &str, prompt: &str) -> std::result::Result<String, CompletionError>;
}

/// Bounded retries for a single API key.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub default_retry_after: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AiConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_backoff_ms),
            max_delay: Duration::from_millis(config.max_backoff_ms),
            default_retry_after: Duration::from_secs(config.default_retry_after_secs),
        }
    }

    /// Delay before retrying after the `attempt`-th network failure (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Delay requested by a 429 response's `Retry-After` header (seconds).
    pub fn retry_after(&self, header: Option<&str>) -> Duration {
        header
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(self.default_retry_after)
            .min(self.max_delay)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Extracts `choices[0].message.content` from a chat-completion body.
pub fn extract_content(body: &str) -> std::result::Result<String, CompletionError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| CompletionError::MalformedResponse("missing choices[0].message.content".to_string()))
}

pub struct OpenRouterClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    referer: String,
    title: String,
    retry: RetryPolicy,
}

impl OpenRouterClient {
    pub fn from_config(config: &AiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| WardrobeError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            referer: config.referer.clone(),
            title: config.title.clone(),
            retry: RetryPolicy::from_config(config),
        })
    }
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    async fn complete(&self, api_key: &str, prompt: &str) -> std::result::Result<String, CompletionError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            let sent = self
                .http
                .post(&self.endpoint)
                .bearer_auth(api_key)
                .header("HTTP-Referer", &self.referer)
                .header("X-Title", &self.title)
                .json(&request)
                .send()
                .await;

            match sent {
                Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                    if attempt >= self.retry.max_attempts {
                        return Err(CompletionError::RateLimited(attempt));
                    }
                    let wait = self.retry.retry_after(
                        response
                            .headers()
                            .get(reqwest::header::RETRY_AFTER)
                            .and_then(|value| value.to_str().ok()),
                    );
                    log::warn!("Completion API rate limited, retrying in {:?}", wait);
                    tokio::time::sleep(wait).await;
                }
                Ok(response) if !response.status().is_success() => {
                    return Err(CompletionError::Status(response.status().as_u16()));
                }
                Ok(response) => {
                    let body = response.text().await?;
                    return extract_content(&body);
                }
                Err(err) => {
                    if attempt >= self.retry.max_attempts {
                        return Err(CompletionError::Network(err));
                    }
                    let wait = self.retry.backoff(attempt);
                    log::warn!("Completion request failed ({}), retrying in {:?}", err, wait);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}

/// Tries every configured key in order until one produces a completion.
#[derive(Clone)]
pub struct FailoverCompleter {
    client: Arc<dyn CompletionClient>,
    keys: Arc<[Secret]>,
}

impl FailoverCompleter {
    pub fn new(client: Arc<dyn CompletionClient>, keys: Vec<Secret>) -> Self {
        Self {
            client,
            keys: keys.into(),
        }
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub async fn complete(&self, prompt: &str) -> Result<String> {
        if self.keys.is_empty() {
            return Err(WardrobeError::upstream(
                "AI service",
                "no API keys configured",
            ));
        }

        let mut last_error = None;
        for (index, key) in self.keys.iter().enumerate() {
            log::info!("Attempting completion with API key {}", index + 1);
            match self.client.complete(key.expose(), prompt).await {
                Ok(content) => {
                    log::info!("Completion succeeded with API key {}", index + 1);
                    return Ok(content);
                }
                Err(err) => {
                    log::warn!("Completion failed with API key {}: {}", index + 1, err);
                    last_error = Some(err);
                }
            }
        }

        let details = last_error
            .map(|err| format!("all {} API keys failed, last error: {}", self.keys.len(), err))
            .unwrap_or_default();
        Err(WardrobeError::upstream("AI service", details))
    }
}
