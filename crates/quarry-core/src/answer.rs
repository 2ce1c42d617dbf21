//! Question answering: retrieve, consult the cache, synthesize on a miss.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::cache::AnswerCache;
use crate::error::{Collaborator, CoreError, Result};
use crate::llm::{LanguageModel, DEFAULT_TEMPERATURE};
use crate::retriever::{is_no_context, HybridRetriever};

/// Returned instead of calling the model when retrieval found nothing.
pub const NO_CONTEXT_ANSWER: &str =
    "No content related to this question was found in the knowledge base.";

#[derive(Debug, Clone, Copy)]
pub struct AnswerOptions {
    pub top_k: usize,
    pub use_hybrid: bool,
    /// Skip both cache lookup and cache write.
    pub bypass_cache: bool,
    pub temperature: f32,
}

impl Default for AnswerOptions {
    fn default() -> Self {
        Self {
            top_k: 3,
            use_hybrid: true,
            bypass_cache: false,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub cached: bool,
    /// Whether retrieval produced any passage.
    pub found: bool,
    #[serde(skip)]
    pub context: String,
}

pub struct QuestionAnswerer {
    retriever: Arc<HybridRetriever>,
    cache: AnswerCache,
    model: Arc<dyn LanguageModel>,
}

impl QuestionAnswerer {
    pub fn new(
        retriever: Arc<HybridRetriever>,
        cache: AnswerCache,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            retriever,
            cache,
            model,
        }
    }

    pub fn cache(&self) -> &AnswerCache {
        &self.cache
    }

    pub async fn ask(&self, question: &str, opts: AnswerOptions) -> Result<Answer> {
        let context = self
            .retriever
            .retrieve_context(question, opts.top_k, opts.use_hybrid)
            .await?;
        let found = !is_no_context(&context);

        if !opts.bypass_cache {
            if let Some(answer) = self.cache.get(question, &context).await {
                return Ok(Answer {
                    answer,
                    cached: true,
                    found,
                    context,
                });
            }
        }

        let answer = synthesize(self.model.as_ref(), question, &context, opts.temperature).await?;

        if !opts.bypass_cache {
            self.cache
                .set(question, &answer, &context, self.cache.default_ttl())
                .await;
        }
        info!(found, "answer synthesized");

        Ok(Answer {
            answer,
            cached: false,
            found,
            context,
        })
    }
}

/// Prompt asking the model to answer strictly from `context`.
pub fn synthesis_prompt(question: &str, context: &str) -> String {
    format!(
        "Answer the question using only the context below. The answer must come from \
the context; do not make anything up.

Context:
{context}

Question: {question}

Answer from the context. If the context does not contain the information, say that \
you cannot answer."
    )
}

/// Produce an answer from retrieved context. Skips the model when the
/// context is empty or the no-content sentinel.
pub async fn synthesize(
    model: &dyn LanguageModel,
    question: &str,
    context: &str,
    temperature: f32,
) -> Result<String> {
    if context.trim().is_empty() || is_no_context(context) {
        debug!("no context, skipping model");
        return Ok(NO_CONTEXT_ANSWER.to_string());
    }
    model
        .complete(&synthesis_prompt(question, context), temperature)
        .await
        .map_err(|e| CoreError::unavailable(Collaborator::Model, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::InMemoryCacheStore;
    use crate::cache::DEFAULT_TTL;
    use crate::fusion::FusionWeights;
    use crate::index::VectorIndex;
    use crate::models::{RetrievedItem, SourceKind};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Passages(Vec<&'static str>);

    #[async_trait]
    impl VectorIndex for Passages {
        async fn search(&self, _q: &str, top_k: usize) -> anyhow::Result<Vec<RetrievedItem>> {
            Ok(self
                .0
                .iter()
                .take(top_k)
                .map(|c| RetrievedItem::new(*c, 0.8, SourceKind::Vector))
                .collect())
        }
    }

    struct CountingModel {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl LanguageModel for CountingModel {
        async fn complete(&self, prompt: &str, _t: f32) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow!("quota exceeded"));
            }
            assert!(prompt.contains("Context:\n[Passage 1]"));
            Ok("Synthesized.".to_string())
        }
    }

    fn model(fail: bool) -> Arc<CountingModel> {
        Arc::new(CountingModel {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    async fn answerer(passages: Vec<&'static str>, model: Arc<CountingModel>) -> QuestionAnswerer {
        let retriever = Arc::new(HybridRetriever::new(
            Arc::new(Passages(passages)),
            None,
            FusionWeights::default(),
        ));
        let cache = AnswerCache::connect(Arc::new(InMemoryCacheStore::new()), DEFAULT_TTL).await;
        QuestionAnswerer::new(retriever, cache, model)
    }

    #[tokio::test]
    async fn test_second_ask_is_cached() {
        let m = model(false);
        let qa = answerer(vec!["Rust is a language."], m.clone()).await;

        let first = qa.ask("what is rust", AnswerOptions::default()).await.unwrap();
        assert!(!first.cached);
        assert!(first.found);
        assert_eq!(first.answer, "Synthesized.");

        let second = qa.ask("what is rust", AnswerOptions::default()).await.unwrap();
        assert!(second.cached);
        assert_eq!(second.answer, "Synthesized.");
        assert_eq!(m.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bypass_cache() {
        let m = model(false);
        let qa = answerer(vec!["Rust is a language."], m.clone()).await;
        let opts = AnswerOptions {
            bypass_cache: true,
            ..AnswerOptions::default()
        };
        qa.ask("q", opts).await.unwrap();
        let again = qa.ask("q", opts).await.unwrap();
        assert!(!again.cached);
        assert_eq!(m.calls.load(Ordering::SeqCst), 2);
        assert_eq!(qa.cache().stats().await.entries, 0);
    }

    #[tokio::test]
    async fn test_no_context_skips_model() {
        let m = model(false);
        let qa = answerer(vec![], m.clone()).await;
        let a = qa.ask("anything", AnswerOptions::default()).await.unwrap();
        assert!(!a.found);
        assert_eq!(a.answer, NO_CONTEXT_ANSWER);
        assert_eq!(m.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_model_failure_surfaces() {
        let qa = answerer(vec!["passage"], model(true)).await;
        let err = qa.ask("q", AnswerOptions::default()).await.unwrap_err();
        assert_eq!(err.collaborator(), Some(Collaborator::Model));
        assert_eq!(qa.cache().stats().await.entries, 0);
    }
}
