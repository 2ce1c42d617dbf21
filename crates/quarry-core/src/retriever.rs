//! Hybrid retriever: vector + keyword search, fused into one context string.
//!
//! # Retrieval paths
//!
//! 1. `use_hybrid` and the keyword index reports healthy: fetch `2 × top_k`
//!    candidates from both indexes concurrently, fuse with RRF, keep the
//!    first `top_k`.
//! 2. Otherwise: fetch `top_k` from the vector index only.
//!
//! A failing keyword search never fails the call; the retriever logs it
//! and continues with the vector results alone. A failing vector search is
//! surfaced as [`CoreError::CollaboratorUnavailable`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{Collaborator, CoreError, Result};
use crate::fusion::{fuse_weighted, FusionWeights};
use crate::index::{KeywordIndex, VectorIndex};
use crate::models::{FusedItem, RetrievedItem};

/// Returned by [`HybridRetriever::retrieve_context`] when nothing matched.
pub const NO_CONTEXT: &str = "No relevant content";

/// Whether `context` is the no-content sentinel rather than retrieved text.
pub fn is_no_context(context: &str) -> bool {
    context.trim() == NO_CONTEXT
}

/// Which path a retrieval actually took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalMode {
    Hybrid,
    VectorOnly,
}

/// Ranked passages plus the path that produced them.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub mode: RetrievalMode,
    pub items: Vec<FusedItem>,
}

pub struct HybridRetriever {
    vector: Arc<dyn VectorIndex>,
    keyword: Option<Arc<dyn KeywordIndex>>,
    weights: FusionWeights,
}

impl HybridRetriever {
    pub fn new(
        vector: Arc<dyn VectorIndex>,
        keyword: Option<Arc<dyn KeywordIndex>>,
        weights: FusionWeights,
    ) -> Self {
        Self {
            vector,
            keyword,
            weights,
        }
    }

    /// Retrieve the top `top_k` passages for `query`.
    pub async fn retrieve(&self, query: &str, top_k: usize, use_hybrid: bool) -> Result<Retrieval> {
        let keyword = match &self.keyword {
            Some(kw) if use_hybrid => {
                if kw.healthy().await {
                    Some(kw)
                } else {
                    debug!("keyword index unhealthy, using vector index only");
                    None
                }
            }
            _ => None,
        };

        let Some(keyword) = keyword else {
            let items = self.vector_search(query, top_k).await?;
            info!(query, results = items.len(), "vector retrieval");
            return Ok(Retrieval {
                mode: RetrievalMode::VectorOnly,
                items: items.into_iter().map(single_source).collect(),
            });
        };

        let candidates = top_k.saturating_mul(2);
        let (vector_res, keyword_res) = tokio::join!(
            self.vector_search(query, candidates),
            keyword.search(query, candidates)
        );
        let vector_items = vector_res?;

        let (mode, keyword_items) = match keyword_res {
            Ok(items) => (RetrievalMode::Hybrid, items),
            Err(e) => {
                warn!(error = %e, "keyword search failed, continuing with vector results");
                (RetrievalMode::VectorOnly, Vec::new())
            }
        };

        debug!(
            vector = vector_items.len(),
            keyword = keyword_items.len(),
            "fusing candidates"
        );

        let mut items = match mode {
            RetrievalMode::Hybrid => fuse_weighted(&vector_items, &keyword_items, &self.weights),
            RetrievalMode::VectorOnly => vector_items.into_iter().map(single_source).collect(),
        };
        items.truncate(top_k);

        info!(query, results = items.len(), ?mode, "retrieval finished");
        Ok(Retrieval { mode, items })
    }

    /// Retrieve and render passages as a single numbered context string.
    ///
    /// Returns [`NO_CONTEXT`] when no passage matched.
    pub async fn retrieve_context(
        &self,
        query: &str,
        top_k: usize,
        use_hybrid: bool,
    ) -> Result<String> {
        let retrieval = self.retrieve(query, top_k, use_hybrid).await?;
        Ok(render_context(&retrieval.items))
    }

    async fn vector_search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedItem>> {
        self.vector
            .search(query, top_k)
            .await
            .map_err(|e| CoreError::unavailable(Collaborator::VectorIndex, e))
    }
}

fn single_source(item: RetrievedItem) -> FusedItem {
    let fused_score = item.source_score;
    FusedItem { item, fused_score }
}

/// Join passages as `[Passage N] <content>` separated by blank lines.
pub fn render_context(items: &[FusedItem]) -> String {
    if items.is_empty() {
        return NO_CONTEXT.to_string();
    }
    items
        .iter()
        .enumerate()
        .map(|(i, f)| format!("[Passage {}] {}", i + 1, f.content()))
        .collect::<Vec<_>>()
        .join("\n\n")
}
