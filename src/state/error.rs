use thiserror::Error;

use crate::core::errors::ConfigError;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to load knowledge index: {0}")]
    Index(#[source] ConfigError),

    #[error("Failed to initialize LLM clients: {0}")]
    Llm(#[source] ConfigError),
}
