//! Wiring of the core components over their concrete collaborators.
//!
//! Both the CLI and the HTTP server go through [`Services`]. Production
//! code builds it with [`Services::from_config`]; tests assemble it from
//! fakes with [`Services::from_parts`].

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use quarry_core::agent::Agent;
use quarry_core::answer::{AnswerOptions, QuestionAnswerer};
use quarry_core::cache::memory::InMemoryCacheStore;
use quarry_core::cache::{AnswerCache, CacheStore};
use quarry_core::index::{IndexStats, KeywordIndex, VectorIndex};
use quarry_core::llm::LanguageModel;
use quarry_core::retriever::HybridRetriever;
use quarry_core::tools::ToolRegistry;

use crate::cache_store::SqliteCacheStore;
use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::llm::create_model;
use crate::migrate::migrate;
use crate::sqlite_index::SqliteIndex;

/// Collaborators handed to [`Services::from_parts`].
pub struct Parts {
    pub vector: Arc<dyn VectorIndex>,
    pub keyword: Option<Arc<dyn KeywordIndex>>,
    pub stats: Arc<dyn IndexStats>,
    pub model: Arc<dyn LanguageModel>,
    pub cache: AnswerCache,
}

pub struct Services {
    pub config: Config,
    pub retriever: Arc<HybridRetriever>,
    pub answerer: QuestionAnswerer,
    pub agent: Agent,
    pub tools: Arc<ToolRegistry>,
    pub stats: Arc<dyn IndexStats>,
    pub cache: AnswerCache,
}

impl Services {
    /// Open the database, run migrations, and build every collaborator
    /// the config selects.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate(&pool).await?;

        let embedder = create_embedder(&config.embedding)?;
        let model = create_model(&config.llm)?;
        let index = Arc::new(SqliteIndex::new(
            pool.clone(),
            embedder,
            config.retrieval.keyword_enabled,
        ));

        let cache = if config.cache.enabled {
            let store: Arc<dyn CacheStore> = match config.cache.backend.as_str() {
                "memory" => Arc::new(InMemoryCacheStore::new()),
                _ => Arc::new(SqliteCacheStore::new(pool.clone())),
            };
            AnswerCache::connect(store, config.cache.ttl()).await
        } else {
            info!("answer cache disabled in config");
            AnswerCache::disabled()
        };

        Ok(Self::from_parts(
            config.clone(),
            Parts {
                vector: index.clone(),
                keyword: Some(index.clone()),
                stats: index,
                model,
                cache,
            },
        ))
    }

    pub fn from_parts(config: Config, parts: Parts) -> Self {
        let retriever = Arc::new(HybridRetriever::new(
            parts.vector,
            parts.keyword,
            config.retrieval.weights(),
        ));
        let tools = Arc::new(ToolRegistry::new(retriever.clone(), parts.stats.clone()));
        let agent = Agent::new(
            parts.model.clone(),
            tools.clone(),
            config.agent.max_iterations,
        );
        let answerer = QuestionAnswerer::new(retriever.clone(), parts.cache.clone(), parts.model);

        Self {
            config,
            retriever,
            answerer,
            agent,
            tools,
            stats: parts.stats,
            cache: parts.cache,
        }
    }

    /// Answer options from config, with per-call overrides.
    pub fn answer_options(
        &self,
        top_k: Option<usize>,
        use_hybrid: Option<bool>,
        bypass_cache: bool,
    ) -> AnswerOptions {
        AnswerOptions {
            top_k: top_k.unwrap_or(self.config.retrieval.top_k).max(1),
            use_hybrid: use_hybrid.unwrap_or(self.config.retrieval.hybrid),
            bypass_cache,
            temperature: self.config.llm.temperature,
        }
    }
}
