//! SQLite-backed search collaborators.
//!
//! - keyword: FTS5 `MATCH` over `chunks_fts`, scored by negated BM25 `rank`
//! - vector: brute-force cosine over every row of `chunk_vectors`
//! - stats: row count of `chunks`

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tracing::debug;

use quarry_core::index::{Embedder, IndexStats, KeywordIndex, VectorIndex};
use quarry_core::models::{RetrievedItem, SourceKind};

use crate::embedding::{blob_to_vec, cosine_similarity};
use crate::migrate::fts_table_exists;

pub struct SqliteIndex {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
    keyword_enabled: bool,
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool, embedder: Arc<dyn Embedder>, keyword_enabled: bool) -> Self {
        Self {
            pool,
            embedder,
            keyword_enabled,
        }
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedItem>> {
        let query_vec = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))?;

        let rows = sqlx::query(
            r#"
            SELECT cv.chunk_id, cv.document_id, cv.embedding, c.content
            FROM chunk_vectors cv
            JOIN chunks c ON c.id = cv.chunk_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut items: Vec<RetrievedItem> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let score = cosine_similarity(&query_vec, &blob_to_vec(&blob)) as f64;
                RetrievedItem::new(row.get::<String, _>("content"), score, SourceKind::Vector)
                    .with_ids(row.get("document_id"), row.get("chunk_id"))
            })
            .collect();

        items.sort_by(|a, b| {
            b.source_score
                .partial_cmp(&a.source_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        items.truncate(top_k);
        debug!(candidates = rows.len(), returned = items.len(), "vector search");
        Ok(items)
    }
}

#[async_trait]
impl KeywordIndex for SqliteIndex {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedItem>> {
        let Some(fts_query) = fts_query(query) else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query(
            r#"
            SELECT chunk_id, document_id, content, rank
            FROM chunks_fts
            WHERE chunks_fts MATCH ?
            ORDER BY rank
            LIMIT ?
            "#,
        )
        .bind(&fts_query)
        .bind(top_k as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let rank: f64 = row.get("rank");
                RetrievedItem::new(row.get::<String, _>("content"), -rank, SourceKind::Keyword)
                    .with_ids(row.get("document_id"), row.get("chunk_id"))
            })
            .collect())
    }

    async fn healthy(&self) -> bool {
        if !self.keyword_enabled {
            return false;
        }
        fts_table_exists(&self.pool).await.unwrap_or(false)
    }
}

#[async_trait]
impl IndexStats for SqliteIndex {
    async fn row_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

/// Turn free text into an FTS5 OR-query of quoted terms.
///
/// FTS5 syntax characters in user input would otherwise be parsed as
/// operators. Returns `None` when no term survives.
pub fn fts_query(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fts_query_quotes_terms() {
        assert_eq!(
            fts_query("What is RRF?").as_deref(),
            Some("\"What\" OR \"is\" OR \"RRF\"")
        );
    }

    #[test]
    fn test_fts_query_strips_operators() {
        assert_eq!(
            fts_query("title:foo AND \"bar\" -baz*").as_deref(),
            Some("\"title\" OR \"foo\" OR \"AND\" OR \"bar\" OR \"baz\"")
        );
        assert_eq!(fts_query("  ?!  "), None);
    }
}
