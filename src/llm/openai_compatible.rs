//! Chat client for hosted OpenAI-compatible endpoints (Groq by default).

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::config::GenerationConfig;
use crate::core::errors::{ConfigError, GenerationError};

const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Clone)]
pub struct OpenAiCompatibleProvider {
    name: String,
    base_url: String,
    model: String,
    api_key: String,
    client: Client,
    timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: &GenerationConfig, api_key: String) -> Result<Self, ConfigError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = build_client(timeout)?;

        Ok(Self {
            name: provider_name(&config.base_url),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            client,
            timeout,
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ConfigError> {
        self.client = build_client(timeout)?;
        self.timeout = timeout;
        Ok(self)
    }

    async fn send_once(&self, body: &Value) -> Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = res.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(GenerationError::Unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let payload: Value = res.json().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout(self.timeout.as_secs())
            } else {
                GenerationError::MalformedResponse(e.to_string())
            }
        })?;

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                GenerationError::MalformedResponse("missing choices[0].message.content".into())
            })?;

        if content.trim().is_empty() {
            return Err(GenerationError::EmptyCompletion);
        }

        Ok(content.to_string())
    }

    fn transport_error(&self, err: reqwest::Error) -> GenerationError {
        if err.is_timeout() {
            GenerationError::Timeout(self.timeout.as_secs())
        } else {
            GenerationError::Transport(err.without_url().to_string())
        }
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let base = self.retry_backoff.as_millis() as u64;
        let exp = base.saturating_mul(1u64 << attempt.min(10));
        let jitter = rand::rng().random_range(0..=base / 2);
        Duration::from_millis(exp + jitter)
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/models", self.base_url);
        match self.client.get(&url).bearer_auth(&self.api_key).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, GenerationError> {
        let mut body = json!({
            "model": self.model,
            "messages": request.messages,
            "stream": false,
        });

        if let (Some(obj), Some(t)) = (body.as_object_mut(), request.temperature) {
            obj.insert("temperature".to_string(), json!(t));
        }

        let mut attempt = 0;
        loop {
            match self.send_once(&body).await {
                Ok(content) => return Ok(content),
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    let delay = self.backoff_for(attempt);
                    tracing::warn!(
                        "{} generation attempt {} failed: {}; retrying in {}ms",
                        self.name,
                        attempt + 1,
                        err,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn build_client(timeout: Duration) -> Result<Client, ConfigError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ConfigError::Invalid(format!("http client: {}", e)))
}

fn provider_name(base_url: &str) -> String {
    if base_url.contains("groq.com") {
        "groq".to_string()
    } else {
        "openai-compatible".to_string()
    }
}
