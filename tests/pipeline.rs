//! Ingest → SQLite index → retrieval → cache, on a temporary database.

use anyhow::Result;
use async_trait::async_trait;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use quarry::cache_store::SqliteCacheStore;
use quarry::config::{parse_config, Config};
use quarry::db;
use quarry::ingest::{ingest_path, IngestOptions};
use quarry::migrate::migrate;
use quarry::sqlite_index::SqliteIndex;
use quarry::stats::document_counts;
use quarry_core::cache::{AnswerCache, CacheStore};
use quarry_core::index::{Embedder, IndexStats, KeywordIndex, VectorIndex};
use quarry_core::retriever::{HybridRetriever, RetrievalMode};

/// Bag-of-words embedder: each lowercase word lands in one of 64 buckets.
struct HashEmbedder;

const DIMS: usize = 64;

fn embed_one(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
    {
        let bucket = word
            .to_lowercase()
            .bytes()
            .fold(7u32, |h, b| h.wrapping_mul(31).wrapping_add(b as u32));
        v[bucket as usize % DIMS] += 1.0;
    }
    v
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-64"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| embed_one(t)).collect())
    }
}

/// Drops the last vector whenever it is asked for more than one.
struct ShortEmbedder;

#[async_trait]
impl Embedder for ShortEmbedder {
    fn model_name(&self) -> &str {
        "short"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors: Vec<Vec<f32>> = texts.iter().map(|t| embed_one(t)).collect();
        if vectors.len() > 1 {
            vectors.pop();
        }
        Ok(vectors)
    }
}

fn opts(embed: bool, max_chars: usize) -> IngestOptions {
    IngestOptions {
        embed,
        max_chars,
        max_file_bytes: 10 * 1024 * 1024,
    }
}

async fn statuses(pool: &sqlx::SqlitePool) -> Vec<(String, String)> {
    sqlx::query_as("SELECT filename, status FROM documents ORDER BY filename")
        .fetch_all(pool)
        .await
        .unwrap()
}

fn test_config(tmp: &TempDir) -> Config {
    parse_config(&format!(
        r#"
[db]
path = "{}"

[llm]
provider = "disabled"
"#,
        tmp.path().join("data/quarry.sqlite").display()
    ))
    .unwrap()
}

fn write_corpus(tmp: &TempDir) -> std::path::PathBuf {
    let dir = tmp.path().join("files");
    fs::create_dir_all(dir.join("nested")).unwrap();
    fs::write(
        dir.join("alpha.md"),
        "# Alpha\n\nRust programming with cargo and crates.\n\nOwnership and borrowing keep memory safe.",
    )
    .unwrap();
    fs::write(
        dir.join("nested/gamma.txt"),
        "Deployment notes.\n\nKubernetes and Docker run the production cluster.",
    )
    .unwrap();
    fs::write(dir.join("beta.txt"), "Python and machine learning with PyTorch.").unwrap();
    fs::write(dir.join("empty.txt"), "\n\n   \n").unwrap();
    fs::write(dir.join("logo.png"), [0x89u8, 0x50, 0x4e, 0x47]).unwrap();
    dir
}

#[tokio::test]
async fn test_ingest_report_and_statuses() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let pool = db::connect(&cfg).await.unwrap();
    migrate(&pool).await.unwrap();
    let dir = write_corpus(&tmp);

    let report = ingest_path(&pool, &HashEmbedder, &opts(true, 500), &dir).await.unwrap();
    assert_eq!(report.files_seen, 5);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.completed, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(report.chunks_written, 3);
    assert_eq!(report.embeddings_written, 3);

    let counts = document_counts(&pool).await.unwrap();
    assert_eq!(counts.documents, 4);
    assert_eq!(counts.completed, 3);
    assert_eq!(counts.failed, 1);
    assert_eq!(counts.embedded_chunks, 3);

    let error: String =
        sqlx::query_scalar("SELECT error FROM documents WHERE status = 'failed'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(error, "no extractable text");
}

#[tokio::test]
async fn test_reingest_replaces_in_place() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let pool = db::connect(&cfg).await.unwrap();
    migrate(&pool).await.unwrap();
    let dir = write_corpus(&tmp);

    ingest_path(&pool, &HashEmbedder, &opts(true, 500), &dir).await.unwrap();
    fs::write(dir.join("beta.txt"), "Python.\n\nPandas and NumPy.").unwrap();
    ingest_path(&pool, &HashEmbedder, &opts(true, 20), &dir).await.unwrap();

    let counts = document_counts(&pool).await.unwrap();
    assert_eq!(counts.documents, 4);

    let index = SqliteIndex::new(pool.clone(), Arc::new(HashEmbedder), true);
    let chunks = index.row_count().await.unwrap();
    let fts_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks_fts")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(fts_rows as u64, chunks);
    assert_eq!(counts.embedded_chunks, chunks);
}

#[tokio::test]
async fn test_ingest_without_embeddings() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let pool = db::connect(&cfg).await.unwrap();
    migrate(&pool).await.unwrap();
    let dir = write_corpus(&tmp);

    let report = ingest_path(&pool, &HashEmbedder, &opts(false, 500), &dir).await.unwrap();
    assert_eq!(report.completed, 3);
    assert_eq!(report.embeddings_written, 0);
    assert_eq!(document_counts(&pool).await.unwrap().embedded_chunks, 0);
}

#[tokio::test]
async fn test_bad_embedder_output_fails_one_file_only() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let pool = db::connect(&cfg).await.unwrap();
    migrate(&pool).await.unwrap();
    let dir = tmp.path().join("files");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("a.txt"), "First paragraph here.\n\nSecond paragraph here.").unwrap();
    fs::write(dir.join("b.txt"), "Only paragraph.").unwrap();

    let report = ingest_path(&pool, &ShortEmbedder, &opts(true, 30), &dir)
        .await
        .unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.chunks_written, 1);

    let rows = statuses(&pool).await;
    assert_eq!(rows.len(), 2);
    assert!(rows[0].0.ends_with("a.txt"));
    assert_eq!(rows[0].1, "failed");
    assert!(rows[1].0.ends_with("b.txt"));
    assert_eq!(rows[1].1, "completed");

    let error: String = sqlx::query_scalar("SELECT error FROM documents WHERE status = 'failed'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(error, "embedder returned 1 vectors for 2 chunks");

    // the failed document leaves nothing searchable behind
    let index = SqliteIndex::new(pool.clone(), Arc::new(HashEmbedder), true);
    assert_eq!(index.row_count().await.unwrap(), 1);
    let fts_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks_fts")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(fts_rows, 1);
}

#[tokio::test]
async fn test_oversized_file_is_failed_unread() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let pool = db::connect(&cfg).await.unwrap();
    migrate(&pool).await.unwrap();
    let dir = tmp.path().join("files");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("big.txt"), "word ".repeat(100)).unwrap();
    fs::write(dir.join("small.txt"), "tiny").unwrap();

    let limits = IngestOptions {
        max_file_bytes: 64,
        ..opts(true, 500)
    };
    let report = ingest_path(&pool, &HashEmbedder, &limits, &dir).await.unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(report.failed, 1);

    let (status, error): (String, String) =
        sqlx::query_as("SELECT status, error FROM documents WHERE filename LIKE '%big.txt'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(status, "failed");
    assert_eq!(error, "file too large: 500 bytes (limit 64)");
}

#[tokio::test]
async fn test_keyword_and_vector_search() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let pool = db::connect(&cfg).await.unwrap();
    migrate(&pool).await.unwrap();
    ingest_path(&pool, &HashEmbedder, &opts(true, 500), &write_corpus(&tmp))
        .await
        .unwrap();

    let index = SqliteIndex::new(pool.clone(), Arc::new(HashEmbedder), true);
    assert!(KeywordIndex::healthy(&index).await);

    let kw = KeywordIndex::search(&index, "Kubernetes?", 5).await.unwrap();
    assert_eq!(kw.len(), 1);
    assert!(kw[0].content.contains("Kubernetes"));
    assert!(kw[0].chunk_id.is_some());

    let vec = VectorIndex::search(&index, "cargo crates rust", 2).await.unwrap();
    assert_eq!(vec.len(), 2);
    assert!(vec[0].content.contains("cargo"));
    assert!(vec[0].source_score >= vec[1].source_score);

    let disabled = SqliteIndex::new(pool.clone(), Arc::new(HashEmbedder), false);
    assert!(!KeywordIndex::healthy(&disabled).await);
}

#[tokio::test]
async fn test_hybrid_retrieval_over_sqlite() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let pool = db::connect(&cfg).await.unwrap();
    migrate(&pool).await.unwrap();
    ingest_path(&pool, &HashEmbedder, &opts(true, 500), &write_corpus(&tmp))
        .await
        .unwrap();

    let index = Arc::new(SqliteIndex::new(pool.clone(), Arc::new(HashEmbedder), true));
    let retriever = HybridRetriever::new(index.clone(), Some(index), cfg.retrieval.weights());

    let hybrid = retriever.retrieve("Docker cluster", 2, true).await.unwrap();
    assert_eq!(hybrid.mode, RetrievalMode::Hybrid);
    assert!(hybrid.items[0].content().contains("Docker"));

    let vector = retriever.retrieve("Docker cluster", 2, false).await.unwrap();
    assert_eq!(vector.mode, RetrievalMode::VectorOnly);
    assert!(vector.items.len() <= 2);
}

#[tokio::test]
async fn test_sqlite_cache_store() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let pool = db::connect(&cfg).await.unwrap();
    migrate(&pool).await.unwrap();
    let store = SqliteCacheStore::new(pool);

    store.ping().await.unwrap();
    store.set("quarry:answer:a", "one", Duration::from_secs(60)).await.unwrap();
    store.set("quarry:answer:b", "two", Duration::from_secs(60)).await.unwrap();
    store.set("other:c", "three", Duration::from_secs(60)).await.unwrap();
    store.set("quarry:answer:gone", "x", Duration::ZERO).await.unwrap();

    assert_eq!(store.get("quarry:answer:a").await.unwrap().as_deref(), Some("one"));
    assert_eq!(store.get("quarry:answer:gone").await.unwrap(), None);
    assert_eq!(
        store.scan_prefix("quarry:answer:").await.unwrap(),
        vec!["quarry:answer:a", "quarry:answer:b"]
    );

    store.set("quarry:answer:a", "uno", Duration::from_secs(60)).await.unwrap();
    assert_eq!(store.get("quarry:answer:a").await.unwrap().as_deref(), Some("uno"));

    assert!(store.delete("quarry:answer:a").await.unwrap());
    assert!(!store.delete("quarry:answer:a").await.unwrap());
}

#[tokio::test]
async fn test_answer_cache_over_sqlite() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let pool = db::connect(&cfg).await.unwrap();
    migrate(&pool).await.unwrap();

    let cache = AnswerCache::connect(Arc::new(SqliteCacheStore::new(pool)), cfg.cache.ttl()).await;
    assert!(cache.is_enabled());
    assert!(cache.set("q", "a", "ctx", cache.default_ttl()).await);
    assert_eq!(cache.get("q", "ctx").await.as_deref(), Some("a"));
    assert_eq!(cache.get("q", "other ctx").await, None);
    assert_eq!(cache.stats().await.entries, 1);
    assert_eq!(cache.clear().await, 1);
    assert_eq!(cache.get("q", "ctx").await, None);
}
