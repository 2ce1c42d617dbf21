//! Answer cache keyed by a fingerprint of (question, context).
//!
//! The cache sits in front of answer synthesis. A key is
//! `quarry:answer:` followed by the hex SHA-256 of `question + ":" + context`,
//! so the same question asked against different retrieved context misses.
//!
//! The cache never raises. Store failures during `get` are misses, during
//! `set`/`delete` they return `false`. If the store does not answer a ping
//! when the cache is built, the cache stays disabled for the lifetime of
//! the process and every operation becomes a no-op.

pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::models::CacheEntry;

/// Key prefix owned by the answer cache. `clear` never touches other keys.
pub const CACHE_NAMESPACE: &str = "quarry:answer:";

/// Number of context characters stored alongside an answer.
const CONTEXT_PREFIX_CHARS: usize = 200;

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Longest lifetime an entry may be given.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 3600);

/// Key/value store with per-key expiry.
///
/// Expired keys must behave as absent. Physical removal of expired keys is
/// the store's business.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Check that the store is reachable.
    async fn ping(&self) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or overwrite `key`, expiring after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Remove `key`. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// All live keys starting with `prefix`.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Snapshot of cache state for the stats endpoint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    pub enabled: bool,
    pub entries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Question/answer cache over a [`CacheStore`].
#[derive(Clone)]
pub struct AnswerCache {
    store: Option<Arc<dyn CacheStore>>,
    default_ttl: Duration,
}

impl AnswerCache {
    /// Build a cache over `store`, disabling it if the store is unreachable.
    pub async fn connect(store: Arc<dyn CacheStore>, default_ttl: Duration) -> Self {
        match store.ping().await {
            Ok(()) => {
                info!("answer cache enabled");
                Self {
                    store: Some(store),
                    default_ttl,
                }
            }
            Err(e) => {
                warn!(error = %e, "cache store unreachable, answer cache disabled");
                Self::disabled()
            }
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self {
            store: None,
            default_ttl: DEFAULT_TTL,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up a cached answer.
    pub async fn get(&self, question: &str, context: &str) -> Option<String> {
        let store = self.store.as_ref()?;
        let key = cache_key(question, context);

        let raw = match store.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key = %short(&key), "cache miss");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "cache read failed");
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => {
                info!(key = %short(&key), "cache hit");
                Some(entry.answer)
            }
            Err(e) => {
                warn!(error = %e, key = %short(&key), "ignoring unreadable cache entry");
                None
            }
        }
    }

    /// Store an answer. Returns `false` when disabled or on store failure.
    pub async fn set(&self, question: &str, answer: &str, context: &str, ttl: Duration) -> bool {
        let Some(store) = self.store.as_ref() else {
            return false;
        };
        if ttl > MAX_TTL {
            warn!(
                ttl_secs = ttl.as_secs(),
                max_secs = MAX_TTL.as_secs(),
                "refusing cache write with oversized ttl"
            );
            return false;
        }
        let key = cache_key(question, context);
        let entry = CacheEntry {
            key: key.clone(),
            question: question.to_string(),
            answer: answer.to_string(),
            context_prefix: context.chars().take(CONTEXT_PREFIX_CHARS).collect(),
            created_at: Utc::now(),
            ttl_secs: ttl.as_secs(),
        };
        let value = match serde_json::to_string(&entry) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "could not encode cache entry");
                return false;
            }
        };

        match store.set(&key, &value, ttl).await {
            Ok(()) => {
                info!(key = %short(&key), ttl_secs = ttl.as_secs(), "cache write");
                true
            }
            Err(e) => {
                warn!(error = %e, "cache write failed");
                false
            }
        }
    }

    /// Remove the entry for a (question, context) pair.
    pub async fn delete(&self, question: &str, context: &str) -> bool {
        let Some(store) = self.store.as_ref() else {
            return false;
        };
        match store.delete(&cache_key(question, context)).await {
            Ok(existed) => existed,
            Err(e) => {
                warn!(error = %e, "cache delete failed");
                false
            }
        }
    }

    /// Remove every entry in the cache namespace. Returns how many went.
    pub async fn clear(&self) -> usize {
        let Some(store) = self.store.as_ref() else {
            return 0;
        };
        let keys = match store.scan_prefix(CACHE_NAMESPACE).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "cache scan failed");
                return 0;
            }
        };

        let mut removed = 0;
        for key in keys {
            match store.delete(&key).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!(error = %e, key = %short(&key), "cache delete failed"),
            }
        }
        info!(removed, "cache cleared");
        removed
    }

    pub async fn stats(&self) -> CacheStats {
        let Some(store) = self.store.as_ref() else {
            return CacheStats {
                enabled: false,
                entries: 0,
                error: None,
            };
        };
        match store.scan_prefix(CACHE_NAMESPACE).await {
            Ok(keys) => CacheStats {
                enabled: true,
                entries: keys.len(),
                error: None,
            },
            Err(e) => CacheStats {
                enabled: true,
                entries: 0,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Deterministic key for a (question, context) pair.
pub fn cache_key(question: &str, context: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(question.as_bytes());
    hasher.update(b":");
    hasher.update(context.as_bytes());
    format!("{}{:x}", CACHE_NAMESPACE, hasher.finalize())
}

fn short(key: &str) -> &str {
    let end = key.len().min(CACHE_NAMESPACE.len() + 12);
    &key[..end]
}
