//! Per-query response pipeline.
//!
//! `Received -> Classified -> Retrieved -> Composed -> Generated -> Delivered`.
//! Each stage consumes the previous stage's value; only `Delivered` touches
//! the transcript, and only after generation succeeded.

use std::sync::Arc;

use thiserror::Error;

use crate::core::errors::GenerationError;
use crate::history::{Transcript, TranscriptEntry};
use crate::intent::{Intent, IntentClassifier};
use crate::llm::{ChatRequest, LlmProvider};
use crate::prompt::PromptComposer;
use crate::rag::{assemble_context, Retriever};

/// Answers are reproducible for the same question and context.
pub const GENERATION_TEMPERATURE: f64 = 0.0;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("query is empty")]
    EmptyQuery,
    #[error("query has {actual} characters, limit is {max}")]
    QueryTooLong { max: usize, actual: usize },
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// What the caller gets back for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub intent: Intent,
    pub context_chunks: usize,
}

struct Received<'a> {
    query: &'a str,
}

struct Classified<'a> {
    query: &'a str,
    intent: Intent,
}

struct Retrieved<'a> {
    query: &'a str,
    intent: Intent,
    context: String,
    context_chunks: usize,
}

struct Composed<'a> {
    query: &'a str,
    intent: Intent,
    prompt: String,
    context_chunks: usize,
}

struct Generated<'a> {
    query: &'a str,
    intent: Intent,
    answer: String,
    context_chunks: usize,
}

#[derive(Clone)]
pub struct ResponsePipeline {
    classifier: IntentClassifier,
    retriever: Retriever,
    composer: PromptComposer,
    provider: Arc<dyn LlmProvider>,
    max_query_chars: usize,
}

impl ResponsePipeline {
    pub fn new(
        classifier: IntentClassifier,
        retriever: Retriever,
        composer: PromptComposer,
        provider: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            classifier,
            retriever,
            composer,
            provider,
            max_query_chars: 4000,
        }
    }

    pub fn with_max_query_chars(mut self, max_query_chars: usize) -> Self {
        self.max_query_chars = max_query_chars;
        self
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    /// Answer one query and append `(query, answer)` to `transcript`.
    ///
    /// On error the transcript is left untouched.
    pub async fn answer(
        &self,
        query: &str,
        transcript: &mut Transcript,
    ) -> Result<Answer, PipelineError> {
        let received = self.receive(query)?;
        let classified = self.classify(received);
        let retrieved = self.retrieve(classified).await;
        let composed = self.compose(retrieved);
        let generated = self.generate(composed).await?;
        Ok(self.deliver(generated, transcript))
    }

    pub fn clear(&self, transcript: &mut Transcript) {
        let dropped = transcript.len();
        transcript.clear();
        tracing::info!("Transcript cleared ({} entries dropped)", dropped);
    }

    fn receive<'a>(&self, query: &'a str) -> Result<Received<'a>, PipelineError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(PipelineError::EmptyQuery);
        }
        let actual = query.chars().count();
        if actual > self.max_query_chars {
            return Err(PipelineError::QueryTooLong {
                max: self.max_query_chars,
                actual,
            });
        }
        tracing::debug!("Received query ({} chars)", actual);
        Ok(Received { query })
    }

    fn classify<'a>(&self, received: Received<'a>) -> Classified<'a> {
        let intent = self.classifier.classify(received.query);
        tracing::info!("Intent: {}", intent.as_str());
        Classified {
            query: received.query,
            intent,
        }
    }

    async fn retrieve<'a>(&self, classified: Classified<'a>) -> Retrieved<'a> {
        let chunks = self.retriever.retrieve(classified.query).await;
        if chunks.is_empty() {
            tracing::debug!("Retrieved no context");
        } else {
            tracing::debug!("Retrieved {} chunks", chunks.len());
        }
        Retrieved {
            query: classified.query,
            intent: classified.intent,
            context: assemble_context(&chunks),
            context_chunks: chunks.len(),
        }
    }

    fn compose<'a>(&self, retrieved: Retrieved<'a>) -> Composed<'a> {
        let prompt = self
            .composer
            .compose(retrieved.intent, &retrieved.context, retrieved.query);
        tracing::debug!("Composed prompt ({} chars)", prompt.len());
        Composed {
            query: retrieved.query,
            intent: retrieved.intent,
            prompt,
            context_chunks: retrieved.context_chunks,
        }
    }

    async fn generate<'a>(&self, composed: Composed<'a>) -> Result<Generated<'a>, PipelineError> {
        let request =
            ChatRequest::from_prompt(composed.prompt).with_temperature(GENERATION_TEMPERATURE);
        let answer = self.provider.chat(request).await.map_err(|e| {
            tracing::error!("Generation failed via {}: {}", self.provider.name(), e);
            PipelineError::Generation(e)
        })?;
        tracing::debug!("Generated answer ({} chars)", answer.len());
        Ok(Generated {
            query: composed.query,
            intent: composed.intent,
            answer,
            context_chunks: composed.context_chunks,
        })
    }

    fn deliver(&self, generated: Generated<'_>, transcript: &mut Transcript) -> Answer {
        transcript.push(TranscriptEntry::new(
            generated.query,
            generated.answer.clone(),
            Some(generated.intent),
        ));
        tracing::debug!("Delivered; transcript has {} entries", transcript.len());
        Answer {
            text: generated.answer,
            intent: generated.intent,
            context_chunks: generated.context_chunks,
        }
    }
}
