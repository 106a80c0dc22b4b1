use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::intent::DEFAULT_MOTIVATION_PATTERNS;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub index: IndexConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub generation: GenerationConfig,
    pub intent: IntentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub max_query_chars: usize,
    pub max_sessions: usize,
    pub session_idle_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            allowed_origins: Vec::new(),
            max_query_chars: 4000,
            max_sessions: 1000,
            session_idle_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub path: PathBuf,
    /// Pinned SHA-256 of the index artifact, hex encoded.
    pub sha256: Option<String>,
    /// Accept an index without a pinned digest. Only for artifacts built in-house.
    pub allow_unverified: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("knowledge_index.db"),
            sha256: None,
            allow_unverified: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub batch_size: usize,
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8090/v1".to_string(),
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            timeout_secs: 30,
            batch_size: 32,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub api_key: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "meta-llama/llama-4-maverick-17b-128e-instruct".to_string(),
            timeout_secs: 60,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    pub motivation_patterns: Vec<String>,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            motivation_patterns: DEFAULT_MOTIVATION_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}
