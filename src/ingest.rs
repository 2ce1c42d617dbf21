//! File ingestion: extract, chunk, index, embed.
//!
//! Each file becomes one `documents` row that moves from `processing` to
//! `completed` or `failed`. Re-ingesting a path replaces its previous
//! chunks and vectors in place. A failure in one file never aborts the run.

use anyhow::{bail, Result};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use quarry_core::index::Embedder;

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::db;
use crate::embedding::{create_embedder, vec_to_blob};
use crate::extract::{load_file, FileType};
use crate::migrate::migrate;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub files_seen: u64,
    pub skipped: u64,
    pub completed: u64,
    pub failed: u64,
    pub chunks_written: u64,
    pub embeddings_written: u64,
}

/// Outcome of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Completed { document_id: i64, chunks: u64, embedded: u64 },
    Failed { document_id: i64, error: String },
}

/// Collect supported files under `path` (or `path` itself), sorted.
pub fn discover(path: &Path) -> Result<(Vec<PathBuf>, u64)> {
    if !path.exists() {
        bail!("Path does not exist: {}", path.display());
    }
    let mut files = Vec::new();
    let mut skipped = 0u64;

    for entry in WalkDir::new(path).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                skipped += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if FileType::from_path(entry.path()).is_some() {
            files.push(entry.into_path());
        } else {
            skipped += 1;
        }
    }
    files.sort();
    Ok((files, skipped))
}

/// Per-run ingest settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    /// Write vectors for each chunk.
    pub embed: bool,
    pub max_chars: usize,
    /// Larger files are marked failed without being read.
    pub max_file_bytes: u64,
}

impl IngestOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            embed: config.embedding.is_enabled(),
            max_chars: config.chunking.max_chars,
            max_file_bytes: config.chunking.max_file_bytes,
        }
    }
}

/// `quarry ingest <path>`: index files and print a summary.
pub async fn run_ingest(config: &Config, path: &Path) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate(&pool).await?;
    let embedder = create_embedder(&config.embedding)?;
    let opts = IngestOptions::from_config(config);

    let report = ingest_path(&pool, embedder.as_ref(), &opts, path).await?;
    pool.close().await;

    println!("Ingest {}", path.display());
    println!("  files:      {}", report.files_seen);
    println!("  skipped:    {}", report.skipped);
    println!("  completed:  {}", report.completed);
    println!("  failed:     {}", report.failed);
    println!("  chunks:     {}", report.chunks_written);
    println!("  embeddings: {}", report.embeddings_written);
    if !opts.embed {
        println!("  (embedding provider disabled; vectors not written)");
    }
    Ok(())
}

/// Ingest every supported file under `path`.
///
/// Only a missing `path` is an error. Every per-file problem, database
/// errors included, is counted as a failed file and the run continues.
pub async fn ingest_path(
    pool: &SqlitePool,
    embedder: &dyn Embedder,
    opts: &IngestOptions,
    path: &Path,
) -> Result<IngestReport> {
    let (files, skipped) = discover(path)?;
    let mut report = IngestReport {
        files_seen: files.len() as u64 + skipped,
        skipped,
        ..IngestReport::default()
    };

    for file in &files {
        match ingest_file(pool, embedder, opts, file).await {
            Ok(FileOutcome::Completed {
                chunks, embedded, ..
            }) => {
                report.completed += 1;
                report.chunks_written += chunks;
                report.embeddings_written += embedded;
            }
            Ok(FileOutcome::Failed { error, .. }) => {
                warn!(file = %file.display(), %error, "ingest failed");
                report.failed += 1;
            }
            Err(e) => {
                warn!(file = %file.display(), error = %e, "ingest failed, document status not recorded");
                report.failed += 1;
            }
        }
    }

    info!(
        completed = report.completed,
        failed = report.failed,
        chunks = report.chunks_written,
        "ingest finished"
    );
    Ok(report)
}

/// Ingest one file.
///
/// Any problem after the document row exists, content or database, is
/// recorded on the row as a `Failed` outcome. An `Err` means the row
/// could not be created or updated at all.
pub async fn ingest_file(
    pool: &SqlitePool,
    embedder: &dyn Embedder,
    opts: &IngestOptions,
    path: &Path,
) -> Result<FileOutcome> {
    let filename = path.display().to_string();
    let file_type = FileType::from_path(path).map(|t| t.as_str()).unwrap_or("unknown");
    let file_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let document_id = begin_document(
        pool,
        &filename,
        file_type,
        i64::try_from(file_size).unwrap_or(i64::MAX),
    )
    .await?;

    match index_document(pool, embedder, opts, document_id, path, file_size).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => fail_document(pool, document_id, e.to_string()).await,
    }
}

async fn index_document(
    pool: &SqlitePool,
    embedder: &dyn Embedder,
    opts: &IngestOptions,
    document_id: i64,
    path: &Path,
    file_size: u64,
) -> Result<FileOutcome> {
    if file_size > opts.max_file_bytes {
        let error = format!(
            "file too large: {} bytes (limit {})",
            file_size, opts.max_file_bytes
        );
        return fail_document(pool, document_id, error).await;
    }

    let text = match load_file(path) {
        Ok((_, text)) => text,
        Err(e) => return fail_document(pool, document_id, e.to_string()).await,
    };
    let chunks = chunk_text(&text, opts.max_chars);
    if chunks.is_empty() {
        return fail_document(pool, document_id, "no extractable text".to_string()).await;
    }

    let chunk_ids = replace_chunks(pool, document_id, &chunks).await?;

    let mut embedded = 0u64;
    if opts.embed {
        let vectors = match embedder.embed(&chunks).await {
            Ok(v) => v,
            Err(e) => {
                return fail_document(pool, document_id, format!("embedding failed: {}", e)).await
            }
        };
        store_vectors(pool, document_id, &chunk_ids, &vectors, embedder).await?;
        embedded = vectors.len() as u64;
    }

    sqlx::query(
        "UPDATE documents SET status = 'completed', chunk_count = ?, error = NULL, updated_at = ? WHERE id = ?",
    )
    .bind(chunks.len() as i64)
    .bind(Utc::now().timestamp())
    .bind(document_id)
    .execute(pool)
    .await?;

    info!(file = %path.display(), document_id, chunks = chunks.len(), "document indexed");
    Ok(FileOutcome::Completed {
        document_id,
        chunks: chunks.len() as u64,
        embedded,
    })
}

/// Insert or reset the document row for `filename` and mark it processing.
async fn begin_document(
    pool: &SqlitePool,
    filename: &str,
    file_type: &str,
    file_size: i64,
) -> Result<i64> {
    let now = Utc::now().timestamp();
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM documents WHERE filename = ?")
        .bind(filename)
        .fetch_optional(pool)
        .await?;

    if let Some(id) = existing {
        sqlx::query(
            "UPDATE documents SET file_type = ?, file_size = ?, status = 'processing', error = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(file_type)
        .bind(file_size)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
        return Ok(id);
    }

    let result = sqlx::query(
        r#"
        INSERT INTO documents (filename, file_type, file_size, chunk_count, status, created_at, updated_at)
        VALUES (?, ?, ?, 0, 'processing', ?, ?)
        "#,
    )
    .bind(filename)
    .bind(file_type)
    .bind(file_size)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Mark a document failed and drop anything already indexed for it.
async fn fail_document(pool: &SqlitePool, document_id: i64, error: String) -> Result<FileOutcome> {
    let mut tx = pool.begin().await?;
    clear_chunks(&mut *tx, document_id).await?;
    sqlx::query(
        "UPDATE documents SET status = 'failed', chunk_count = 0, error = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&error)
    .bind(Utc::now().timestamp())
    .bind(document_id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(FileOutcome::Failed { document_id, error })
}

async fn clear_chunks(conn: &mut SqliteConnection, document_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM chunk_vectors WHERE document_id = ?")
        .bind(document_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM chunks_fts WHERE document_id = ?")
        .bind(document_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM chunks WHERE document_id = ?")
        .bind(document_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn replace_chunks(pool: &SqlitePool, document_id: i64, chunks: &[String]) -> Result<Vec<i64>> {
    let mut tx = pool.begin().await?;
    clear_chunks(&mut *tx, document_id).await?;

    let mut ids = Vec::with_capacity(chunks.len());
    for (index, content) in chunks.iter().enumerate() {
        let chunk_id = sqlx::query(
            "INSERT INTO chunks (document_id, chunk_index, content) VALUES (?, ?, ?)",
        )
        .bind(document_id)
        .bind(index as i64)
        .bind(content)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        sqlx::query("INSERT INTO chunks_fts (chunk_id, document_id, content) VALUES (?, ?, ?)")
            .bind(chunk_id)
            .bind(document_id)
            .bind(content)
            .execute(&mut *tx)
            .await?;
        ids.push(chunk_id);
    }

    tx.commit().await?;
    Ok(ids)
}

async fn store_vectors(
    pool: &SqlitePool,
    document_id: i64,
    chunk_ids: &[i64],
    vectors: &[Vec<f32>],
    embedder: &dyn Embedder,
) -> Result<()> {
    if chunk_ids.len() != vectors.len() {
        bail!(
            "embedder returned {} vectors for {} chunks",
            vectors.len(),
            chunk_ids.len()
        );
    }
    let mut tx = pool.begin().await?;
    for (chunk_id, vector) in chunk_ids.iter().zip(vectors) {
        sqlx::query(
            r#"
            INSERT INTO chunk_vectors (chunk_id, document_id, model, dims, embedding)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(chunk_id) DO UPDATE SET
                model = excluded.model, dims = excluded.dims, embedding = excluded.embedding
            "#,
        )
        .bind(chunk_id)
        .bind(document_id)
        .bind(embedder.model_name())
        .bind(vector.len() as i64)
        .bind(vec_to_blob(vector))
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}
