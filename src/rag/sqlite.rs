//! On-disk index artifact.
//!
//! A SQLite file with two tables: `index_meta` (key/value) and `chunks`
//! (chunk text plus a little-endian `f32` embedding blob). The server only
//! ever opens it read-only; `IndexWriter` is used by the operator's build step.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use super::store::DocumentChunk;
use crate::core::errors::ConfigError;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct IndexMeta {
    pub format_version: u32,
    pub embedding_model: String,
    pub dimension: usize,
    pub chunk_count: usize,
    pub created_at: String,
}

/// Read the whole artifact into memory.
pub async fn read_index(
    path: &Path,
) -> Result<(IndexMeta, Vec<(DocumentChunk, Vec<f32>)>), ConfigError> {
    if !path.exists() {
        return Err(ConfigError::IndexMissing(path.to_path_buf()));
    }

    let corrupt = |reason: String| ConfigError::IndexCorrupt {
        path: path.to_path_buf(),
        reason,
    };

    let options = SqliteConnectOptions::new()
        .filename(path)
        .read_only(true)
        .create_if_missing(false);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(|e| corrupt(e.to_string()))?;

    let meta = read_meta(&pool).await.map_err(corrupt)?;

    let rows = sqlx::query(
        "SELECT chunk_id, content, source, start_offset, chunk_index, embedding
         FROM chunks
         ORDER BY rowid",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| corrupt(e.to_string()))?;

    let mut items = Vec::with_capacity(rows.len());
    for row in &rows {
        let chunk = row_to_chunk(row).map_err(|e| corrupt(e.to_string()))?;
        let blob: Vec<u8> = row
            .try_get("embedding")
            .map_err(|e| corrupt(e.to_string()))?;
        let embedding = deserialize_embedding(&blob).ok_or_else(|| {
            corrupt(format!("chunk {} has a truncated embedding", chunk.chunk_id))
        })?;
        if embedding.len() != meta.dimension {
            return Err(corrupt(format!(
                "chunk {} has dimension {}, index declares {}",
                chunk.chunk_id,
                embedding.len(),
                meta.dimension
            )));
        }
        items.push((chunk, embedding));
    }

    if items.len() != meta.chunk_count {
        return Err(corrupt(format!(
            "index declares {} chunks but contains {}",
            meta.chunk_count,
            items.len()
        )));
    }

    pool.close().await;
    Ok((meta, items))
}

async fn read_meta(pool: &SqlitePool) -> Result<IndexMeta, String> {
    let rows = sqlx::query("SELECT key, value FROM index_meta")
        .fetch_all(pool)
        .await
        .map_err(|e| e.to_string())?;

    let mut values = HashMap::new();
    for row in &rows {
        let key: String = row.try_get("key").map_err(|e| e.to_string())?;
        let value: String = row.try_get("value").map_err(|e| e.to_string())?;
        values.insert(key, value);
    }

    let field = |key: &str| {
        values
            .get(key)
            .cloned()
            .ok_or_else(|| format!("missing index_meta entry `{}`", key))
    };
    let number = |key: &str| -> Result<usize, String> {
        field(key)?
            .parse::<usize>()
            .map_err(|e| format!("index_meta `{}`: {}", key, e))
    };

    let format_version = number("format_version")? as u32;
    if format_version != FORMAT_VERSION {
        return Err(format!(
            "unsupported format_version {} (expected {})",
            format_version, FORMAT_VERSION
        ));
    }

    Ok(IndexMeta {
        format_version,
        embedding_model: field("embedding_model")?,
        dimension: number("dimension")?,
        chunk_count: number("chunk_count")?,
        created_at: field("created_at").unwrap_or_default(),
    })
}

fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> Result<DocumentChunk, sqlx::Error> {
    let start_offset: i64 = row.try_get("start_offset")?;
    let chunk_index: i64 = row.try_get("chunk_index")?;

    Ok(DocumentChunk {
        chunk_id: row.try_get("chunk_id")?,
        content: row.try_get("content")?,
        source: row.try_get("source")?,
        start_offset: start_offset.max(0) as usize,
        chunk_index: chunk_index.max(0) as usize,
    })
}

pub fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub fn deserialize_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

/// Writes a fresh artifact. Refuses to overwrite an existing file.
pub struct IndexWriter {
    pool: SqlitePool,
    path: PathBuf,
    embedding_model: String,
    dimension: Option<usize>,
    chunk_count: usize,
}

impl IndexWriter {
    pub async fn create(path: &Path, embedding_model: &str) -> anyhow::Result<Self> {
        if path.exists() {
            anyhow::bail!("{} already exists; refusing to overwrite", path.display());
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::query(
            "CREATE TABLE index_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE chunks (
                chunk_id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                source TEXT NOT NULL,
                start_offset INTEGER NOT NULL,
                chunk_index INTEGER NOT NULL,
                embedding BLOB NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self {
            pool,
            path: path.to_path_buf(),
            embedding_model: embedding_model.to_string(),
            dimension: None,
            chunk_count: 0,
        })
    }

    pub async fn insert_batch(&mut self, items: &[(DocumentChunk, Vec<f32>)]) -> anyhow::Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for (chunk, embedding) in items {
            let expected = *self.dimension.get_or_insert(embedding.len());
            if embedding.len() != expected || expected == 0 {
                anyhow::bail!(
                    "chunk {} has dimension {}, expected {}",
                    chunk.chunk_id,
                    embedding.len(),
                    expected
                );
            }

            sqlx::query(
                "INSERT INTO chunks (chunk_id, content, source, start_offset, chunk_index, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(&chunk.chunk_id)
            .bind(&chunk.content)
            .bind(&chunk.source)
            .bind(chunk.start_offset as i64)
            .bind(chunk.chunk_index as i64)
            .bind(serialize_embedding(embedding))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.chunk_count += items.len();
        Ok(())
    }

    /// Close without writing metadata; the file is left unreadable as an index.
    pub async fn abort(self) {
        self.pool.close().await;
    }

    /// Write the metadata and close the file.
    pub async fn finish(self) -> anyhow::Result<IndexMeta> {
        let meta = IndexMeta {
            format_version: FORMAT_VERSION,
            embedding_model: self.embedding_model.clone(),
            dimension: self.dimension.unwrap_or(0),
            chunk_count: self.chunk_count,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        let entries = [
            ("format_version", meta.format_version.to_string()),
            ("embedding_model", meta.embedding_model.clone()),
            ("dimension", meta.dimension.to_string()),
            ("chunk_count", meta.chunk_count.to_string()),
            ("created_at", meta.created_at.clone()),
        ];

        let mut tx = self.pool.begin().await?;
        for (key, value) in entries {
            sqlx::query("INSERT OR REPLACE INTO index_meta (key, value) VALUES (?1, ?2)")
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        self.pool.close().await;

        tracing::info!(
            "Wrote index {} ({} chunks, dimension {})",
            self.path.display(),
            meta.chunk_count,
            meta.dimension
        );
        Ok(meta)
    }
}
