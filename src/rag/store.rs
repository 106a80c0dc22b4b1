//! KnowledgeIndex trait and the chunk types it returns.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::RetrievalError;

/// A unit of the knowledge base. Immutable once the index is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Unique chunk identifier (`<source>#<chunk_index>`).
    pub chunk_id: String,
    /// The text content of the chunk.
    pub content: String,
    /// Source document (relative file name).
    pub source: String,
    /// Character offset in the source document.
    pub start_offset: usize,
    /// Chunk index within the source.
    pub chunk_index: usize,
}

/// Result of a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSearchResult {
    pub chunk: DocumentChunk,
    /// Cosine similarity (higher = better).
    pub score: f32,
}

/// Read-only nearest-neighbour search over the knowledge base.
///
/// Implementations return at most `k` results, ordered by score descending.
#[async_trait]
pub trait KnowledgeIndex: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<ChunkSearchResult>, RetrievalError>;

    /// Number of chunks available for search.
    fn chunk_count(&self) -> usize;
}
