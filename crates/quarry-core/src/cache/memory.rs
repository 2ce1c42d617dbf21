//! In-process [`CacheStore`] for tests and single-process deployments.
//!
//! Backed by a bounded `moka` cache. Each entry carries its own lifetime,
//! so expiry is handled by moka rather than on our write path.

use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use async_trait::async_trait;
use moka::sync::Cache;
use moka::Expiry;

use super::{CacheStore, MAX_TTL};

/// Entry count at which moka starts evicting.
const MAX_ENTRIES: u64 = 10_000;

#[derive(Clone)]
struct Slot {
    value: String,
    ttl: Duration,
}

/// Expires each slot after the ttl it was written with.
struct SlotTtl;

impl Expiry<String, Slot> for SlotTtl {
    fn expire_after_create(&self, _key: &String, slot: &Slot, _created_at: Instant) -> Option<Duration> {
        Some(slot.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        slot: &Slot,
        _updated_at: Instant,
        _remaining: Option<Duration>,
    ) -> Option<Duration> {
        Some(slot.ttl)
    }
}

pub struct InMemoryCacheStore {
    slots: Cache<String, Slot>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_ENTRIES)
    }

    pub fn with_capacity(max_entries: u64) -> Self {
        let slots = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(SlotTtl)
            .build();
        Self { slots }
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.slots.get(key).map(|s| s.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        if ttl > MAX_TTL {
            bail!(
                "ttl of {}s exceeds the {}s maximum",
                ttl.as_secs(),
                MAX_TTL.as_secs()
            );
        }
        self.slots.insert(
            key.to_string(),
            Slot {
                value: value.to_string(),
                ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let live = self.slots.get(key).is_some();
        self.slots.invalidate(key);
        Ok(live)
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .slots
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.to_string())
            .collect();
        keys.sort();
        Ok(keys)
    }
}
