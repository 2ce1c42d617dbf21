//! Search collaborator traits.
//!
//! The core never talks to an index directly. Implementations live in the
//! app crate (SQLite FTS5 and brute-force cosine) or in tests.
//!
//! All traits use `anyhow::Result`; the retriever and tools translate
//! failures into [`CoreError`](crate::error::CoreError) at their own
//! boundaries.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::RetrievedItem;

/// Text embedding model.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    fn dims(&self) -> usize;

    /// One vector per input text, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Dense similarity search. Embeds the query itself.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return up to `top_k` passages, best first.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedItem>>;
}

/// Sparse term-frequency search (BM25-style).
#[async_trait]
pub trait KeywordIndex: Send + Sync {
    /// Return up to `top_k` passages, best first.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedItem>>;

    /// Whether the index is reachable and enabled. Must not fail.
    async fn healthy(&self) -> bool;
}

/// Corpus statistics.
#[async_trait]
pub trait IndexStats: Send + Sync {
    /// Number of indexed passages.
    async fn row_count(&self) -> Result<u64>;
}
