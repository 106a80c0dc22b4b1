use async_trait::async_trait;

use super::types::ChatRequest;
use crate::core::errors::GenerationError;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// provider name used in logs (e.g. "groq")
    fn name(&self) -> &str;

    /// model identifier sent with every request
    fn model(&self) -> &str;

    /// check if the endpoint is reachable with the configured credential
    async fn health_check(&self) -> bool;

    /// chat completion (non-streaming)
    async fn chat(&self, request: ChatRequest) -> Result<String, GenerationError>;
}
