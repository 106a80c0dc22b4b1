//! Operator tool: build the knowledge index artifact from a document folder.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use branch_assistant::core::config::{AppPaths, ConfigService, EmbeddingConfig};
use branch_assistant::core::logging;
use branch_assistant::llm::{Embedder, HttpEmbedder};
use branch_assistant::rag::{ChunkingConfig, IndexBuilder, TextChunker};

#[derive(Debug, Parser)]
#[command(name = "build-index", version, about = "Build the assistant's knowledge index")]
struct Cli {
    /// Folder of .txt / .md documents (searched recursively)
    #[arg(long, short = 's')]
    source: PathBuf,

    /// Output SQLite file; must not exist yet
    #[arg(long, short = 'o', default_value = "knowledge_index.db")]
    output: PathBuf,

    /// Chunk window, in characters
    #[arg(long, default_value_t = 500)]
    chunk_size: usize,

    /// Overlap between consecutive windows, in characters
    #[arg(long, default_value_t = 50)]
    chunk_overlap: usize,

    /// Embedding endpoint; defaults to `embedding.base_url` from config.yml
    #[arg(long)]
    embedding_url: Option<String>,

    /// Embedding model; defaults to `embedding.model` from config.yml
    #[arg(long)]
    embedding_model: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_stderr();
    let cli = Cli::parse();

    if cli.chunk_overlap >= cli.chunk_size {
        anyhow::bail!("--chunk-overlap must be smaller than --chunk-size");
    }

    let mut embedding = load_embedding_config();
    if let Some(url) = cli.embedding_url {
        embedding.base_url = url;
    }
    if let Some(model) = cli.embedding_model {
        embedding.model = model;
    }

    let embedder: Arc<dyn Embedder> =
        Arc::new(HttpEmbedder::new(&embedding).context("Failed to build embedding client")?);
    let chunker = TextChunker::new(ChunkingConfig {
        chunk_size: cli.chunk_size,
        chunk_overlap: cli.chunk_overlap,
    });

    let report = IndexBuilder::new(chunker, embedder)
        .with_batch_size(embedding.batch_size)
        .build(&cli.source, &cli.output)
        .await
        .with_context(|| format!("Failed to build {}", cli.output.display()))?;

    println!(
        "{}: {} documents, {} chunks, dimension {}, model {}",
        report.path.display(),
        report.documents,
        report.meta.chunk_count,
        report.meta.dimension,
        report.meta.embedding_model
    );
    println!("index.sha256: {}", report.sha256);
    Ok(())
}

/// Embedding settings from the server's config, so the index matches what
/// the server will query with. Falls back to defaults outside a deployment.
fn load_embedding_config() -> EmbeddingConfig {
    let service = ConfigService::new(Arc::new(AppPaths::new()));
    match service.load_app_config() {
        Ok(config) => config.embedding,
        Err(err) => {
            tracing::warn!("Using default embedding settings ({})", err);
            EmbeddingConfig::default()
        }
    }
}
