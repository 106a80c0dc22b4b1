//! Retrieval over the operator-built knowledge index.
//!
//! - `sqlite`: the on-disk artifact (reader and writer)
//! - `index`: trust checks, the in-memory `EmbeddingIndex` and its load-once handle
//! - `retriever`: top-k retrieval and context assembly
//! - `ingest`: chunking and index building for the `build-index` tool

pub mod index;
pub mod ingest;
pub mod retriever;
pub mod sqlite;
pub mod store;

pub use index::{file_sha256, EmbeddingIndex, IndexHandle, IndexTrust};
pub use ingest::{BuildReport, ChunkingConfig, IndexBuilder, TextChunker};
pub use retriever::{assemble_context, Retriever, CONTEXT_SEPARATOR};
pub use sqlite::{IndexMeta, IndexWriter};
pub use store::{ChunkSearchResult, DocumentChunk, KnowledgeIndex};
