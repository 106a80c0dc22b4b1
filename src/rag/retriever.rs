//! Top-k retrieval and context assembly.

use std::sync::Arc;

use super::store::KnowledgeIndex;

pub const CONTEXT_SEPARATOR: &str = "\n\n";

#[derive(Clone)]
pub struct Retriever {
    index: Arc<dyn KnowledgeIndex>,
    top_k: usize,
}

impl Retriever {
    pub fn new(index: Arc<dyn KnowledgeIndex>, top_k: usize) -> Self {
        Self { index, top_k }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Chunk contents for `query`, best first, at most `top_k` of them.
    ///
    /// Search failures degrade to an empty result; the prompts handle missing
    /// context themselves.
    pub async fn retrieve(&self, query: &str) -> Vec<String> {
        match self.index.search(query, self.top_k).await {
            Ok(mut results) => {
                results.truncate(self.top_k);
                results.into_iter().map(|r| r.chunk.content).collect()
            }
            Err(e) => {
                tracing::warn!("Retrieval failed, continuing without context: {}", e);
                Vec::new()
            }
        }
    }
}

pub fn assemble_context(chunks: &[String]) -> String {
    chunks.join(CONTEXT_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::core::errors::RetrievalError;
    use crate::rag::store::{ChunkSearchResult, DocumentChunk};

    /// Returns its fixed chunks regardless of `k`.
    struct Careless(Vec<&'static str>);

    #[async_trait]
    impl KnowledgeIndex for Careless {
        async fn search(&self, _query: &str, _k: usize) -> Result<Vec<ChunkSearchResult>, RetrievalError> {
            Ok(self
                .0
                .iter()
                .enumerate()
                .map(|(i, text)| ChunkSearchResult {
                    chunk: DocumentChunk {
                        chunk_id: format!("doc#{}", i),
                        content: text.to_string(),
                        source: "doc".to_string(),
                        start_offset: 0,
                        chunk_index: i,
                    },
                    score: 1.0 - i as f32 * 0.1,
                })
                .collect())
        }

        fn chunk_count(&self) -> usize {
            self.0.len()
        }
    }

    struct Broken;

    #[async_trait]
    impl KnowledgeIndex for Broken {
        async fn search(&self, _query: &str, _k: usize) -> Result<Vec<ChunkSearchResult>, RetrievalError> {
            Err(RetrievalError::Embedding("connection refused".into()))
        }

        fn chunk_count(&self) -> usize {
            0
        }
    }

    #[tokio::test]
    async fn returns_all_chunks_when_index_has_fewer_than_k() {
        let retriever = Retriever::new(Arc::new(Careless(vec!["satu", "dua"])), 3);
        assert_eq!(retriever.retrieve("q").await, vec!["satu", "dua"]);
    }

    #[tokio::test]
    async fn never_returns_more_than_k() {
        let retriever = Retriever::new(Arc::new(Careless(vec!["a", "b", "c", "d", "e"])), 3);
        let chunks = retriever.retrieve("q").await;
        assert_eq!(chunks, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn search_failure_degrades_to_empty_context() {
        let retriever = Retriever::new(Arc::new(Broken), 3);
        let chunks = retriever.retrieve("q").await;
        assert!(chunks.is_empty());
        assert_eq!(assemble_context(&chunks), "");
    }

    #[test]
    fn context_keeps_rank_order_with_blank_line_separator() {
        let chunks = vec!["pertama".to_string(), "kedua".to_string()];
        assert_eq!(assemble_context(&chunks), "pertama\n\nkedua");
    }
}
