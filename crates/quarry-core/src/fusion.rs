//! Weighted reciprocal-rank fusion (RRF).
//!
//! ```text
//! fused(c) = Σ  w_list / (k + rank_list(c))
//! ```
//!
//! Ranks are 1-based positions in each input list. Raw backend scores are
//! ignored: cosine similarities and BM25 scores live on incomparable scales,
//! ranks do not.
//!
//! Passages are identified by their exact `content` string. When both lists
//! contain the same passage its contributions are summed and the metadata of
//! the first occurrence is kept, vector list first.

use std::collections::HashMap;

use crate::models::{FusedItem, RetrievedItem};

/// Standard RRF smoothing constant.
pub const DEFAULT_RRF_K: usize = 60;

/// Per-list weights and the RRF constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub vector: f64,
    pub keyword: f64,
    pub k: usize,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            vector: 0.6,
            keyword: 0.4,
            k: DEFAULT_RRF_K,
        }
    }
}

/// Fuse two ranked lists into one list ordered by fused score.
///
/// No truncation happens here. Items with empty content are skipped.
/// Equal scores keep first-seen order, so the output is fully determined
/// by the inputs.
pub fn fuse(
    vector_list: &[RetrievedItem],
    keyword_list: &[RetrievedItem],
    vector_weight: f64,
    keyword_weight: f64,
    k: usize,
) -> Vec<FusedItem> {
    let mut fused: Vec<FusedItem> = Vec::with_capacity(vector_list.len() + keyword_list.len());
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for (list, weight) in [(vector_list, vector_weight), (keyword_list, keyword_weight)] {
        for (idx, item) in list.iter().enumerate() {
            if item.content.is_empty() {
                continue;
            }
            let contribution = rrf_contribution(weight, idx + 1, k);
            match positions.get(item.content.as_str()) {
                Some(&pos) => fused[pos].fused_score += contribution,
                None => {
                    positions.insert(item.content.as_str(), fused.len());
                    fused.push(FusedItem {
                        item: item.clone(),
                        fused_score: contribution,
                    });
                }
            }
        }
    }

    // `sort_by` is stable: ties stay in first-seen order.
    fused.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    fused
}

/// Fuse with a [`FusionWeights`] bundle.
pub fn fuse_weighted(
    vector_list: &[RetrievedItem],
    keyword_list: &[RetrievedItem],
    weights: &FusionWeights,
) -> Vec<FusedItem> {
    fuse(
        vector_list,
        keyword_list,
        weights.vector,
        weights.keyword,
        weights.k,
    )
}

/// Score contributed by an item at 1-based `rank` in a list with `weight`.
pub fn rrf_contribution(weight: f64, rank: usize, k: usize) -> f64 {
    weight / (k + rank) as f64
}
