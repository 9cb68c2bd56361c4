//! LLM client trait and the OpenAI-compatible provider implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{Error, Result};

use super::types::ChatMessage;

/// LLM client trait: a synchronous chat completion over an ordered
/// message list. Implementations hide rate limiting and retry; callers
/// only ever see a transient/permanent error classification.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete the conversation and return the assistant's text.
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Retry configuration for LLM requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum retries for a single request.
    pub max_retries: u32,
    /// Base delay used for exponential backoff.
    pub base_delay_ms: u64,
    /// Backoff multiplier applied per retry attempt.
    pub backoff_factor: f64,
    /// Ceiling for a single backoff sleep.
    pub max_delay_ms: u64,
}

impl RetryConfig {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.max(1.0).powi(attempt as i32);
        let millis = (self.base_delay_ms as f64 * factor).round().max(0.0) as u64;
        Duration::from_millis(millis.min(self.max_delay_ms))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            backoff_factor: 2.0,
            max_delay_ms: 30_000,
        }
    }
}

/// Sliding-window rate limit: at most `max_requests` per `window`.
#[derive(Debug, Clone)]
pub struct RateLimit {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window: Duration::from_secs(60),
        }
    }
}

/// Request timestamps inside the current window.
#[derive(Debug, Default)]
struct SlidingWindow {
    sent: VecDeque<Instant>,
}

impl SlidingWindow {
    /// How long the caller must wait before the next request is admitted.
    /// Admits the request (records a timestamp) when the answer is zero.
    fn admit_or_wait(&mut self, limit: &RateLimit, now: Instant) -> Option<Duration> {
        while let Some(front) = self.sent.front() {
            if now.duration_since(*front) >= limit.window {
                self.sent.pop_front();
            } else {
                break;
            }
        }

        if (self.sent.len() as u32) < limit.max_requests {
            self.sent.push_back(now);
            None
        } else {
            let oldest = *self.sent.front().expect("window not empty");
            Some(limit.window.saturating_sub(now.duration_since(oldest)))
        }
    }
}

/// Configuration for the OpenAI-compatible client.
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    /// API key
    pub api_key: String,
    /// Base URL override
    pub base_url: Option<String>,
    /// Model identifier
    pub model: String,
    /// Sampling temperature
    pub temperature: f64,
    /// Completion token cap
    pub max_tokens: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retry behavior
    pub retry: RetryConfig,
    /// Request rate limit
    pub rate_limit: RateLimit,
}

impl LlmClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            max_tokens: 2048,
            timeout_secs: 120,
            retry: RetryConfig::default(),
            rate_limit: RateLimit::default(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = rate_limit;
        self
    }
}

// OpenAI-compatible wire types
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Chat-completion client for OpenAI-compatible endpoints.
///
/// Applies the sliding-window rate limit before every attempt and retries
/// transient failures (429, 5xx, transport) with exponential backoff.
pub struct OpenAiCompatClient {
    config: LlmClientConfig,
    http: Client,
    window: Mutex<SlidingWindow>,
}

impl OpenAiCompatClient {
    const DEFAULT_BASE_URL: &'static str = "https://api.openai.com";

    pub fn new(config: LlmClientConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            config,
            http,
            window: Mutex::new(SlidingWindow::default()),
        }
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(Self::DEFAULT_BASE_URL)
    }

    /// Block until the sliding window admits another request.
    async fn acquire_slot(&self) {
        loop {
            let wait = {
                let mut window = self.window.lock().await;
                window.admit_or_wait(&self.config.rate_limit, Instant::now())
            };

            match wait {
                Some(wait) => {
                    debug!(wait_ms = wait.as_millis() as u64, "rate limit reached");
                    sleep(wait).await;
                }
                None => break,
            }
        }
    }

    /// One HTTP attempt. Errors are pre-classified transient/permanent.
    async fn attempt(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let url = format!("{}/v1/chat/completions", self.base_url());

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::llm_transient(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::llm_transient(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            let message = format!("API error ({}): {}", status, detail);
            return if status.as_u16() == 429 || status.is_server_error() {
                Err(Error::llm_transient(message))
            } else {
                Err(Error::llm_permanent(message))
            };
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| Error::llm_transient(format!("failed to parse response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::llm_transient("no choices in response"))
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String> {
        let mut last_error = None;

        for attempt in 0..=self.config.retry.max_retries {
            if attempt > 0 {
                let delay = self.config.retry.delay_for_attempt(attempt - 1);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying LLM call");
                sleep(delay).await;
            }

            self.acquire_slot().await;

            match self.attempt(messages).await {
                Ok(content) => return Ok(content),
                Err(err @ Error::LlmPermanent(_)) => return Err(err),
                Err(err) => {
                    warn!(attempt, error = %err, "LLM attempt failed");
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::llm_transient("retries exhausted")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let retry = RetryConfig {
            max_retries: 5,
            base_delay_ms: 100,
            backoff_factor: 2.0,
            max_delay_ms: 350,
        };

        assert_eq!(retry.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(retry.delay_for_attempt(1), Duration::from_millis(200));
        // 400ms capped to the ceiling
        assert_eq!(retry.delay_for_attempt(2), Duration::from_millis(350));
    }

    #[test]
    fn test_sliding_window_admits_until_limit() {
        let limit = RateLimit {
            max_requests: 2,
            window: Duration::from_secs(60),
        };
        let mut window = SlidingWindow::default();
        let start = Instant::now();

        assert_eq!(window.admit_or_wait(&limit, start), None);
        assert_eq!(window.admit_or_wait(&limit, start), None);

        // Third request in the same window must wait out the remainder.
        let wait = window
            .admit_or_wait(&limit, start + Duration::from_secs(10))
            .expect("limit reached");
        assert_eq!(wait, Duration::from_secs(50));
    }

    #[test]
    fn test_sliding_window_expires_old_requests() {
        let limit = RateLimit {
            max_requests: 1,
            window: Duration::from_secs(60),
        };
        let mut window = SlidingWindow::default();
        let start = Instant::now();

        assert_eq!(window.admit_or_wait(&limit, start), None);
        // After the window passes, the old timestamp is evicted.
        assert_eq!(
            window.admit_or_wait(&limit, start + Duration::from_secs(61)),
            None
        );
    }

    #[test]
    fn test_config_builder() {
        let config = LlmClientConfig::new("key")
            .with_base_url("http://localhost:8080")
            .with_model("test-model")
            .with_max_tokens(512);

        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.model, "test-model");
        assert_eq!(config.max_tokens, 512);
    }
}
