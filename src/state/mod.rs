use std::sync::Arc;
use std::time::Duration;

use crate::core::config::{AppConfig, AppPaths, ConfigService};
use crate::core::security::{init_api_token, resolve_generation_key, ApiToken};
use crate::history::{spawn_idle_sweeper, SessionLimits, SessionStore};
use crate::intent::IntentClassifier;
use crate::llm::{Embedder, HttpEmbedder, LlmProvider, OpenAiCompatibleProvider};
use crate::pipeline::ResponsePipeline;
use crate::prompt::PromptComposer;
use crate::rag::{IndexHandle, IndexTrust, KnowledgeIndex, Retriever};

pub mod error;

use error::InitializationError;

/// Application state shared across all routes.
///
/// Everything here is built once at process start; the knowledge index is
/// read-only afterwards and per-session transcripts live in `sessions`.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: Arc<AppConfig>,
    pub api_token: ApiToken,
    pub index: Arc<dyn KnowledgeIndex>,
    pub pipeline: ResponsePipeline,
    pub sessions: SessionStore,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// This process includes:
    /// 1. Resolving paths and loading configuration
    /// 2. Resolving the generation credential
    /// 3. Compiling the intent lexicon
    /// 4. Verifying and loading the knowledge index
    /// 5. Wiring the response pipeline
    ///
    /// Any failure is fatal; the server never starts half-configured.
    pub async fn initialize() -> Result<Arc<Self>, InitializationError> {
        Self::initialize_with(Arc::new(AppPaths::new())).await
    }

    pub async fn initialize_with(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone()).load_app_config()?;

        let api_key = resolve_generation_key(config.generation.api_key.as_deref())?;
        let classifier = IntentClassifier::new(&config.intent.motivation_patterns)?;

        let embedder: Arc<dyn Embedder> =
            Arc::new(HttpEmbedder::new(&config.embedding).map_err(InitializationError::Llm)?);
        let handle = IndexHandle::new(
            paths.resolve(&config.index.path),
            IndexTrust::from_config(&config.index),
            embedder,
        );
        let index: Arc<dyn KnowledgeIndex> =
            handle.get_or_load().await.map_err(InitializationError::Index)?;

        let provider: Arc<dyn LlmProvider> = Arc::new(
            OpenAiCompatibleProvider::new(&config.generation, api_key)
                .map_err(InitializationError::Llm)?,
        );
        tracing::info!(
            "Generation via {} ({}), top_k {}",
            provider.name(),
            provider.model(),
            config.retrieval.top_k
        );

        let checked = provider.clone();
        tokio::spawn(async move {
            if !checked.health_check().await {
                tracing::warn!(
                    "{} endpoint did not answer the startup health check; queries may fail",
                    checked.name()
                );
            }
        });

        let pipeline = ResponsePipeline::new(
            classifier,
            Retriever::new(index.clone(), config.retrieval.top_k),
            PromptComposer::new(),
            provider,
        )
        .with_max_query_chars(config.server.max_query_chars);

        let api_token = init_api_token(&paths.token_path);

        let state = Self::from_parts(paths, Arc::new(config), api_token, index, pipeline);
        let limits = state.sessions.limits();
        spawn_idle_sweeper(
            &state.sessions,
            (limits.idle_ttl / 4).max(Duration::from_secs(1)),
        );
        tracing::info!(
            "Sessions capped at {}, idle after {}s",
            limits.max_sessions,
            limits.idle_ttl.as_secs()
        );

        Ok(Arc::new(state))
    }

    pub fn from_parts(
        paths: Arc<AppPaths>,
        config: Arc<AppConfig>,
        api_token: ApiToken,
        index: Arc<dyn KnowledgeIndex>,
        pipeline: ResponsePipeline,
    ) -> Self {
        let sessions = SessionStore::with_limits(SessionLimits {
            max_sessions: config.server.max_sessions,
            idle_ttl: Duration::from_secs(config.server.session_idle_secs),
        });
        Self {
            paths,
            config,
            api_token,
            index,
            pipeline,
            sessions,
        }
    }
}
