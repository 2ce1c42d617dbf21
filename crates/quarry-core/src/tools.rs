//! The fixed tool set offered to the reasoning loop.
//!
//! Tools are a closed enum resolved by name. Invocation never fails at the
//! type level: a tool returns a [`ToolOutcome`], and failures are rendered
//! into observation strings the model can read.

use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use tracing::{debug, info};

use crate::calculator::{evaluate, format_number};
use crate::error::{Collaborator, CoreError};
use crate::index::IndexStats;
use crate::models::ToolInfo;
use crate::retriever::{is_no_context, HybridRetriever};

/// Passages fetched by the knowledge search tool.
pub const SEARCH_TOP_K: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    KnowledgeSearch,
    Calculator,
    CurrentTime,
    CurrentDate,
    DocumentCount,
}

impl ToolKind {
    pub const ALL: [ToolKind; 5] = [
        ToolKind::KnowledgeSearch,
        ToolKind::Calculator,
        ToolKind::CurrentTime,
        ToolKind::CurrentDate,
        ToolKind::DocumentCount,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::KnowledgeSearch => "knowledge_search",
            ToolKind::Calculator => "calculator",
            ToolKind::CurrentTime => "current_time",
            ToolKind::CurrentDate => "current_date",
            ToolKind::DocumentCount => "document_count",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolKind::KnowledgeSearch => {
                "Search the knowledge base for relevant documents. Input: the search query text. \
                 Use it for questions that need information from the documents."
            }
            ToolKind::Calculator => {
                "Evaluate a math expression. Input: an expression such as '2 + 3 * 4'. \
                 Supports + - * / ** %, parentheses, abs, round, min, max, sum, pow, sqrt, pi and e."
            }
            ToolKind::CurrentTime => "Get the current date and time. No input needed.",
            ToolKind::CurrentDate => "Get today's date and day of the week. No input needed.",
            ToolKind::DocumentCount => {
                "Count the document chunks in the knowledge base. No input needed."
            }
        }
    }

    /// Resolve a tool by exact name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    fn failure_prefix(self) -> &'static str {
        match self {
            ToolKind::KnowledgeSearch => "Search failed",
            ToolKind::Calculator => "Calculation error",
            ToolKind::DocumentCount => "Statistics failed",
            ToolKind::CurrentTime | ToolKind::CurrentDate => "Tool failed",
        }
    }

    /// Render an outcome as the observation text shown to the model.
    pub fn observation(self, outcome: &ToolOutcome) -> String {
        match outcome {
            ToolOutcome::Ok(text) => text.clone(),
            ToolOutcome::Failed(err) => {
                let reason = match err {
                    CoreError::ToolExecutionFailure { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                format!("{}: {}", self.failure_prefix(), reason)
            }
        }
    }
}

/// Result of one tool invocation.
#[derive(Debug)]
pub enum ToolOutcome {
    Ok(String),
    Failed(CoreError),
}

impl ToolOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, ToolOutcome::Ok(_))
    }
}

/// Holds the collaborators tools need. Built once, shared read-only.
pub struct ToolRegistry {
    retriever: Arc<HybridRetriever>,
    stats: Arc<dyn IndexStats>,
}

impl ToolRegistry {
    pub fn new(retriever: Arc<HybridRetriever>, stats: Arc<dyn IndexStats>) -> Self {
        Self { retriever, stats }
    }

    pub fn find(&self, name: &str) -> Option<ToolKind> {
        ToolKind::from_name(name)
    }

    pub fn list_tools(&self) -> Vec<ToolInfo> {
        ToolKind::ALL
            .iter()
            .map(|k| ToolInfo {
                name: k.name().to_string(),
                description: k.description().to_string(),
            })
            .collect()
    }

    /// `- name: description` lines for the agent prompt.
    pub fn prompt_listing(&self) -> String {
        ToolKind::ALL
            .iter()
            .map(|k| format!("- {}: {}", k.name(), k.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub async fn invoke(&self, kind: ToolKind, input: &str) -> ToolOutcome {
        info!(tool = kind.name(), input, "invoking tool");
        let outcome = match kind {
            ToolKind::KnowledgeSearch => self.knowledge_search(input).await,
            ToolKind::Calculator => calculate(input),
            ToolKind::CurrentTime => ToolOutcome::Ok(current_time(Local::now().naive_local())),
            ToolKind::CurrentDate => ToolOutcome::Ok(current_date(Local::now().naive_local())),
            ToolKind::DocumentCount => self.document_count().await,
        };
        debug!(tool = kind.name(), ok = outcome.is_ok(), "tool finished");
        outcome
    }

    /// Invoke and render straight to an observation string.
    pub async fn observe(&self, kind: ToolKind, input: &str) -> String {
        let outcome = self.invoke(kind, input).await;
        kind.observation(&outcome)
    }

    async fn knowledge_search(&self, query: &str) -> ToolOutcome {
        match self
            .retriever
            .retrieve_context(query, SEARCH_TOP_K, true)
            .await
        {
            Ok(ctx) if ctx.is_empty() || is_no_context(&ctx) => {
                ToolOutcome::Ok("No relevant documents found".to_string())
            }
            Ok(ctx) => ToolOutcome::Ok(format!("Found relevant documents:\n{}", ctx)),
            Err(e) => ToolOutcome::Failed(e),
        }
    }

    async fn document_count(&self) -> ToolOutcome {
        match self.stats.row_count().await {
            Ok(n) => ToolOutcome::Ok(format!(
                "The knowledge base contains {} document chunks",
                n
            )),
            Err(e) => ToolOutcome::Failed(CoreError::unavailable(Collaborator::IndexStats, e)),
        }
    }
}

fn calculate(input: &str) -> ToolOutcome {
    match evaluate(input.trim()) {
        Ok(v) => ToolOutcome::Ok(format!("Result: {}", format_number(v))),
        Err(e) => ToolOutcome::Failed(CoreError::ToolExecutionFailure {
            tool: ToolKind::Calculator.name().to_string(),
            message: e.to_string(),
        }),
    }
}

fn current_time(now: NaiveDateTime) -> String {
    format!("Current time: {}", now.format("%Y-%m-%d %H:%M:%S"))
}

fn current_date(now: NaiveDateTime) -> String {
    format!("Today is {}", now.format("%B %-d, %Y, %A"))
}
