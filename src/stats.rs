//! Corpus and cache overview for `quarry stats`.

use anyhow::Result;
use serde::Serialize;
use sqlx::SqlitePool;

use quarry_core::index::IndexStats;

use crate::config::Config;
use crate::services::Services;

/// Document counts by ingest status.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentCounts {
    pub documents: u64,
    pub completed: u64,
    pub failed: u64,
    pub embedded_chunks: u64,
}

pub async fn document_counts(pool: &SqlitePool) -> Result<DocumentCounts> {
    let (documents, completed, failed): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COALESCE(SUM(status = 'completed'), 0),
               COALESCE(SUM(status = 'failed'), 0)
        FROM documents
        "#,
    )
    .fetch_one(pool)
    .await?;
    let embedded: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors")
        .fetch_one(pool)
        .await?;

    Ok(DocumentCounts {
        documents: documents as u64,
        completed: completed as u64,
        failed: failed as u64,
        embedded_chunks: embedded as u64,
    })
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let services = Services::from_config(config).await?;
    let pool = crate::db::connect(config).await?;
    let counts = document_counts(&pool).await?;
    pool.close().await;

    let chunks = services.stats.row_count().await?;
    let cache = services.cache.stats().await;
    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Quarry Corpus Stats");
    println!("===================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!(
        "  Documents:   {} ({} completed, {} failed)",
        counts.documents, counts.completed, counts.failed
    );
    println!("  Chunks:      {}", chunks);
    println!(
        "  Embedded:    {} / {} ({}%)",
        counts.embedded_chunks,
        chunks,
        if chunks > 0 {
            (counts.embedded_chunks * 100) / chunks
        } else {
            0
        }
    );
    println!();
    if cache.enabled {
        println!("  Cache:       {} entries", cache.entries);
    } else {
        println!("  Cache:       disabled");
    }
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
