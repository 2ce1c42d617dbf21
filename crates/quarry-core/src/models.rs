//! Data types that flow through retrieval, caching, and the reasoning loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which index produced a retrieved passage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Vector,
    Keyword,
}

/// A passage returned by one of the search collaborators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedItem {
    /// Passage text. Also the identity used when fusing lists.
    pub content: String,
    /// Raw score from the backend (cosine similarity or BM25).
    pub source_score: f64,
    pub source_kind: SourceKind,
    pub document_id: Option<i64>,
    pub chunk_id: Option<i64>,
}

impl RetrievedItem {
    pub fn new(content: impl Into<String>, source_score: f64, source_kind: SourceKind) -> Self {
        Self {
            content: content.into(),
            source_score,
            source_kind,
            document_id: None,
            chunk_id: None,
        }
    }

    pub fn with_ids(mut self, document_id: i64, chunk_id: i64) -> Self {
        self.document_id = Some(document_id);
        self.chunk_id = Some(chunk_id);
        self
    }
}

/// A retrieved item with its reciprocal-rank fusion score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedItem {
    #[serde(flatten)]
    pub item: RetrievedItem,
    pub fused_score: f64,
}

impl FusedItem {
    pub fn content(&self) -> &str {
        &self.item.content
    }
}

/// What the answer cache stores under each key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub question: String,
    pub answer: String,
    /// First 200 characters of the context the answer was produced from.
    pub context_prefix: String,
    pub created_at: DateTime<Utc>,
    pub ttl_secs: u64,
}

/// One tool invocation recorded by the reasoning loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReasoningStep {
    pub tool_name: String,
    pub tool_input: String,
    pub observation: String,
}

/// Terminal output of one reasoning-loop run.
#[derive(Debug, Clone, Serialize)]
pub struct AgentResult {
    pub success: bool,
    pub answer: String,
    pub steps: Vec<ReasoningStep>,
    /// Always equal to `steps.len()`.
    pub tool_call_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResult {
    pub(crate) fn finish(
        success: bool,
        answer: String,
        steps: Vec<ReasoningStep>,
        error: Option<String>,
    ) -> Self {
        let tool_call_count = steps.len();
        Self {
            success,
            answer,
            steps,
            tool_call_count,
            error,
        }
    }
}

/// Name and description of a registered tool, as listed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}
