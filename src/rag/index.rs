//! In-memory embedding index loaded once from the on-disk artifact.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tokio::sync::OnceCell;

use super::sqlite::{read_index, IndexMeta};
use super::store::{ChunkSearchResult, DocumentChunk, KnowledgeIndex};
use crate::core::config::IndexConfig;
use crate::core::errors::{ConfigError, RetrievalError};
use crate::llm::Embedder;
use crate::vector_math::{top_k_descending, NormalizedMatrix};

/// Which index artifacts this process is willing to load.
///
/// The artifact is trusted input: its chunk text ends up verbatim in every
/// prompt. Either its digest is pinned, or the operator has explicitly opted
/// into loading it unverified.
#[derive(Debug, Clone, Default)]
pub struct IndexTrust {
    pub sha256: Option<String>,
    pub allow_unverified: bool,
}

impl IndexTrust {
    pub fn from_config(config: &IndexConfig) -> Self {
        Self {
            sha256: config
                .sha256
                .as_ref()
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty()),
            allow_unverified: config.allow_unverified,
        }
    }

    pub async fn verify(&self, path: &Path) -> Result<(), ConfigError> {
        if !path.exists() {
            return Err(ConfigError::IndexMissing(path.to_path_buf()));
        }

        match &self.sha256 {
            Some(expected) => {
                let actual = file_sha256(path).await.map_err(|e| ConfigError::IndexCorrupt {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
                if !actual.eq_ignore_ascii_case(expected) {
                    return Err(ConfigError::IndexDigestMismatch {
                        path: path.to_path_buf(),
                        expected: expected.clone(),
                        actual,
                    });
                }
                tracing::info!("Index digest verified for {}", path.display());
                Ok(())
            }
            None if self.allow_unverified => {
                tracing::warn!(
                    "Loading unverified index {} as trusted input (index.allow_unverified)",
                    path.display()
                );
                Ok(())
            }
            None => Err(ConfigError::IndexUntrusted(path.to_path_buf())),
        }
    }
}

/// Hex-encoded SHA-256 of a file, streamed.
pub async fn file_sha256(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub struct EmbeddingIndex {
    meta: IndexMeta,
    chunks: Vec<DocumentChunk>,
    matrix: NormalizedMatrix,
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for EmbeddingIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingIndex")
            .field("meta", &self.meta)
            .field("chunks", &self.chunks.len())
            .finish()
    }
}

impl EmbeddingIndex {
    /// Verify, read and hold the whole artifact in memory.
    pub async fn load(
        path: &Path,
        trust: &IndexTrust,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, ConfigError> {
        trust.verify(path).await?;

        let (meta, items) = read_index(path).await?;
        if meta.embedding_model != embedder.model() {
            return Err(ConfigError::Invalid(format!(
                "index {} was built with `{}` but embedding.model is `{}`",
                path.display(),
                meta.embedding_model,
                embedder.model()
            )));
        }

        let index = Self::from_parts(meta, items, embedder)?;
        tracing::info!(
            "Loaded index {} ({} chunks, dimension {}, model {})",
            path.display(),
            index.meta.chunk_count,
            index.meta.dimension,
            index.meta.embedding_model
        );
        Ok(index)
    }

    pub fn from_parts(
        meta: IndexMeta,
        items: Vec<(DocumentChunk, Vec<f32>)>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, ConfigError> {
        let (chunks, vectors): (Vec<_>, Vec<_>) = items.into_iter().unzip();
        let matrix = NormalizedMatrix::from_vectors(&vectors, meta.dimension).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "index vectors do not all have dimension {}",
                meta.dimension
            ))
        })?;

        Ok(Self {
            meta,
            chunks,
            matrix,
            embedder,
        })
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }
}

#[async_trait]
impl KnowledgeIndex for EmbeddingIndex {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<ChunkSearchResult>, RetrievalError> {
        if k == 0 || self.chunks.is_empty() {
            return Ok(Vec::new());
        }

        let embedded = self.embedder.embed(&[query.to_string()]).await?;
        let query_vector = embedded
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::Embedding("no embedding returned for query".into()))?;

        if query_vector.len() != self.matrix.dimension() {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.matrix.dimension(),
                actual: query_vector.len(),
            });
        }

        let scores = self.matrix.cosine_scores(&query_vector);
        Ok(top_k_descending(&scores, k)
            .into_iter()
            .map(|(i, score)| ChunkSearchResult {
                chunk: self.chunks[i].clone(),
                score,
            })
            .collect())
    }

    fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

/// Process-wide, load-once handle to the embedding index.
///
/// Cloning shares the cell; concurrent first callers of `get_or_load` wait on
/// the same load.
#[derive(Clone)]
pub struct IndexHandle {
    path: PathBuf,
    trust: IndexTrust,
    embedder: Arc<dyn Embedder>,
    cell: Arc<OnceCell<Arc<EmbeddingIndex>>>,
}

impl IndexHandle {
    pub fn new(path: PathBuf, trust: IndexTrust, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            path,
            trust,
            embedder,
            cell: Arc::new(OnceCell::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get_or_load(&self) -> Result<Arc<EmbeddingIndex>, ConfigError> {
        self.cell
            .get_or_try_init(|| async {
                EmbeddingIndex::load(&self.path, &self.trust, self.embedder.clone())
                    .await
                    .map(Arc::new)
            })
            .await
            .cloned()
    }

    /// The index if it has already been loaded.
    pub fn get(&self) -> Option<Arc<EmbeddingIndex>> {
        self.cell.get().cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tempfile::TempDir;

    use super::*;
    use crate::rag::sqlite::IndexWriter;

    const MODEL: &str = "test-embedder";

    /// Maps known words onto fixed axes; counts calls.
    struct KeywordEmbedder {
        model: String,
        calls: AtomicUsize,
    }

    impl KeywordEmbedder {
        fn new(model: &str) -> Self {
            Self {
                model: model.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        fn model(&self) -> &str {
            &self.model
        }

        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(inputs
                .iter()
                .map(|text| {
                    let text = text.to_lowercase();
                    vec![
                        if text.contains("tabungan") { 1.0 } else { 0.0 },
                        if text.contains("kredit") { 1.0 } else { 0.0 },
                        if text.contains("asuransi") { 1.0 } else { 0.0 },
                    ]
                })
                .collect())
        }
    }

    fn chunk(i: usize, content: &str) -> DocumentChunk {
        DocumentChunk {
            chunk_id: format!("produk.md#{}", i),
            content: content.to_string(),
            source: "produk.md".to_string(),
            start_offset: i * 100,
            chunk_index: i,
        }
    }

    async fn write_fixture(dir: &TempDir, model: &str) -> PathBuf {
        let path = dir.path().join("knowledge_index.db");
        let mut writer = IndexWriter::create(&path, model).await.expect("writer");
        writer
            .insert_batch(&[
                (chunk(0, "Tabungan bebas biaya admin."), vec![1.0, 0.0, 0.0]),
                (chunk(1, "Kartu kredit dengan cashback."), vec![0.0, 1.0, 0.0]),
                (chunk(2, "Asuransi jiwa untuk nasabah."), vec![0.0, 0.0, 1.0]),
                (chunk(3, "Tabungan berjangka dan kredit."), vec![0.7, 0.7, 0.0]),
            ])
            .await
            .expect("insert");
        writer.finish().await.expect("finish");
        path
    }

    fn unverified() -> IndexTrust {
        IndexTrust {
            sha256: None,
            allow_unverified: true,
        }
    }

    #[tokio::test]
    async fn search_ranks_by_cosine_similarity() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(&dir, MODEL).await;
        let index = EmbeddingIndex::load(&path, &unverified(), Arc::new(KeywordEmbedder::new(MODEL)))
            .await
            .expect("load");

        assert_eq!(index.chunk_count(), 4);
        let results = index.search("info tabungan", 2).await.expect("search");

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.chunk_index, 0);
        assert_eq!(results[1].chunk.chunk_index, 3);
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn search_returns_everything_when_k_exceeds_size() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(&dir, MODEL).await;
        let index = EmbeddingIndex::load(&path, &unverified(), Arc::new(KeywordEmbedder::new(MODEL)))
            .await
            .expect("load");

        let results = index.search("kredit", 10).await.expect("search");
        assert_eq!(results.len(), 4);
        assert!(index.search("kredit", 0).await.expect("search").is_empty());
    }

    #[tokio::test]
    async fn pinned_digest_must_match() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(&dir, MODEL).await;
        let digest = file_sha256(&path).await.expect("digest");

        let pinned = IndexTrust {
            sha256: Some(digest.to_uppercase()),
            allow_unverified: false,
        };
        assert!(pinned.verify(&path).await.is_ok());

        let wrong = IndexTrust {
            sha256: Some("0".repeat(64)),
            allow_unverified: true,
        };
        let err = wrong.verify(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::IndexDigestMismatch { actual, .. } if actual == digest));
    }

    #[tokio::test]
    async fn unpinned_index_is_refused_by_default() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(&dir, MODEL).await;

        let err = EmbeddingIndex::load(
            &path,
            &IndexTrust::default(),
            Arc::new(KeywordEmbedder::new(MODEL)),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ConfigError::IndexUntrusted(_)));
    }

    #[tokio::test]
    async fn missing_index_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = EmbeddingIndex::load(
            &dir.path().join("absent.db"),
            &unverified(),
            Arc::new(KeywordEmbedder::new(MODEL)),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ConfigError::IndexMissing(_)));
    }

    #[tokio::test]
    async fn embedding_model_must_match_artifact() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(&dir, MODEL).await;

        let err = EmbeddingIndex::load(
            &path,
            &unverified(),
            Arc::new(KeywordEmbedder::new("another-model")),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("another-model")));
    }

    #[tokio::test]
    async fn query_dimension_mismatch_is_a_retrieval_error() {
        struct Wide;

        #[async_trait]
        impl Embedder for Wide {
            fn model(&self) -> &str {
                MODEL
            }
            async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
                Ok(inputs.iter().map(|_| vec![1.0; 8]).collect())
            }
        }

        let meta = IndexMeta {
            format_version: 1,
            embedding_model: MODEL.to_string(),
            dimension: 3,
            chunk_count: 1,
            created_at: String::new(),
        };
        let index = EmbeddingIndex::from_parts(
            meta,
            vec![(chunk(0, "Tabungan"), vec![1.0, 0.0, 0.0])],
            Arc::new(Wide),
        )
        .expect("index");

        let err = index.search("tabungan", 3).await.unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::DimensionMismatch { expected: 3, actual: 8 }
        ));
    }

    #[tokio::test]
    async fn concurrent_first_access_loads_once() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(&dir, MODEL).await;
        let handle = IndexHandle::new(path, unverified(), Arc::new(KeywordEmbedder::new(MODEL)));
        assert!(handle.get().is_none());

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let handle = handle.clone();
                tokio::spawn(async move { handle.get_or_load().await.expect("load") })
            })
            .collect();

        let mut loaded = Vec::new();
        for task in tasks {
            loaded.push(task.await.expect("join"));
        }

        let first = handle.get().expect("loaded");
        assert!(loaded.iter().all(|index| Arc::ptr_eq(index, &first)));
    }

    #[tokio::test]
    async fn failed_load_is_not_cached_as_empty() {
        let dir = TempDir::new().unwrap();
        let handle = IndexHandle::new(
            dir.path().join("absent.db"),
            unverified(),
            Arc::new(KeywordEmbedder::new(MODEL)),
        );

        assert!(handle.get_or_load().await.is_err());
        assert!(handle.get().is_none());
    }
}
