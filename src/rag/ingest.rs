//! Operator-side index building: read documents, chunk, embed, write.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::index::file_sha256;
use super::sqlite::{IndexMeta, IndexWriter};
use super::store::DocumentChunk;
use crate::llm::Embedder;

const DOCUMENT_EXTENSIONS: [&str; 2] = ["txt", "md"];

/// Chunking parameters, in characters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TextChunker {
    config: ChunkingConfig,
}

impl TextChunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Split text into overlapping windows, preferring to end a window on a
    /// sentence boundary. Blank windows are dropped.
    pub fn split(&self, text: &str, source: &str) -> Vec<DocumentChunk> {
        let chunk_size = self.config.chunk_size.max(1);
        let overlap = self.config.chunk_overlap;

        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < total_chars {
            let end = (start + chunk_size).min(total_chars);
            let window: String = chars[start..end].iter().collect();

            let window = if end < total_chars {
                cut_at_sentence_boundary(&window)
            } else {
                window.as_str()
            };

            let content = window.trim();
            if !content.is_empty() {
                let chunk_index = chunks.len();
                chunks.push(DocumentChunk {
                    chunk_id: format!("{}#{}", source, chunk_index),
                    content: content.to_string(),
                    source: source.to_string(),
                    start_offset: start,
                    chunk_index,
                });
            }

            if end == total_chars {
                break;
            }
            // Next window overlaps the end of what was emitted, not of the raw window.
            let emitted = window.chars().count();
            start = (start + emitted).saturating_sub(overlap).max(start + 1);
        }

        chunks
    }
}

/// Cut after the last sentence ending found in the final 20% of the window.
fn cut_at_sentence_boundary(text: &str) -> &str {
    const SENTENCE_ENDINGS: [&str; 6] = [". ", "! ", "? ", ".\n", "!\n", "?\n"];

    let mut search_start = text.len() * 80 / 100;
    while !text.is_char_boundary(search_start) {
        search_start += 1;
    }
    let tail = &text[search_start..];

    SENTENCE_ENDINGS
        .iter()
        .filter_map(|ending| tail.rfind(ending).map(|pos| pos + ending.len()))
        .max()
        .map(|cut| &text[..search_start + cut])
        .unwrap_or(text)
}

/// A source document: path relative to the source directory, and its text.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub name: String,
    pub text: String,
}

/// Read every `.txt` / `.md` file under `dir`, sorted by relative path.
pub fn collect_documents(dir: &Path) -> anyhow::Result<Vec<SourceDocument>> {
    let mut files = Vec::new();
    walk(dir, &mut files).with_context(|| format!("reading {}", dir.display()))?;
    files.sort();

    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let name = path
            .strip_prefix(dir)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        documents.push(SourceDocument { name, text });
    }
    Ok(documents)
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, out)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| DOCUMENT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
        {
            out.push(path);
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub path: PathBuf,
    pub documents: usize,
    pub meta: IndexMeta,
    pub sha256: String,
}

pub struct IndexBuilder {
    chunker: TextChunker,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl IndexBuilder {
    pub fn new(chunker: TextChunker, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            chunker,
            embedder,
            batch_size: 64,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub async fn build(&self, source_dir: &Path, output: &Path) -> anyhow::Result<BuildReport> {
        let documents = collect_documents(source_dir)?;
        if documents.is_empty() {
            anyhow::bail!("no .txt or .md documents found in {}", source_dir.display());
        }

        let chunks: Vec<DocumentChunk> = documents
            .iter()
            .flat_map(|doc| self.chunker.split(&doc.text, &doc.name))
            .collect();
        if chunks.is_empty() {
            anyhow::bail!("documents in {} contain no text", source_dir.display());
        }
        tracing::info!(
            "Chunked {} documents into {} chunks",
            documents.len(),
            chunks.len()
        );

        if output.exists() {
            anyhow::bail!("{} already exists; refusing to overwrite", output.display());
        }

        // Written aside and renamed on success, so a failed build leaves nothing at `output`.
        let partial = partial_path(output);
        remove_if_present(&partial).await?;

        let meta = match self.write_index(&chunks, &partial).await {
            Ok(meta) => meta,
            Err(err) => {
                if let Err(cleanup) = remove_if_present(&partial).await {
                    tracing::warn!("Failed to remove {}: {}", partial.display(), cleanup);
                }
                return Err(err);
            }
        };
        tokio::fs::rename(&partial, output)
            .await
            .with_context(|| format!("moving {} into place", partial.display()))?;
        let sha256 = file_sha256(output).await?;

        Ok(BuildReport {
            path: output.to_path_buf(),
            documents: documents.len(),
            meta,
            sha256,
        })
    }

    async fn write_index(&self, chunks: &[DocumentChunk], path: &Path) -> anyhow::Result<IndexMeta> {
        let mut writer = IndexWriter::create(path, self.embedder.model()).await?;
        if let Err(err) = self.embed_into(&mut writer, chunks).await {
            writer.abort().await;
            return Err(err);
        }
        writer.finish().await
    }

    async fn embed_into(&self, writer: &mut IndexWriter, chunks: &[DocumentChunk]) -> anyhow::Result<()> {
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            if vectors.len() != batch.len() {
                anyhow::bail!(
                    "embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                );
            }
            let items: Vec<(DocumentChunk, Vec<f32>)> =
                batch.iter().cloned().zip(vectors).collect();
            writer.insert_batch(&items).await?;
            tracing::debug!("Embedded {} chunks", items.len());
        }
        Ok(())
    }
}

fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(".partial");
    PathBuf::from(name)
}

async fn remove_if_present(path: &Path) -> std::io::Result<()> {
    for candidate in [path.to_path_buf(), journal_path(path)] {
        match tokio::fs::remove_file(&candidate).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn journal_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push("-journal");
    PathBuf::from(name)
}
