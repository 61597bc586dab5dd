//! In-process key-value store using DashMap
//!
//! Per-key atomicity comes from DashMap's shard locks: every mutation goes
//! through the entry API, so a compare-and-swap and a concurrent delete on the
//! same key serialize. Expiry is checked on read; `purge_expired` reclaims
//! memory but is never needed for correctness.
//!
//! **Important**: this store is NOT distributed. Multi-instance deployments
//! plug a shared backend in behind [`KeyValueStore`].

use super::errors::KvResult;
use super::traits::KeyValueStore;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn new(value: &str, ttl: Option<Duration>) -> Self {
        Self {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map(|at| now < at).unwrap_or(true)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    entries: DashMap<String, StoredValue>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired entries; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, stored| stored.is_live(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed = removed, "Purged expired store entries");
        }
        removed
    }

    /// Number of physically stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let now = Instant::now();
        let result = self
            .entries
            .get(key)
            .filter(|stored| stored.is_live(now))
            .map(|stored| stored.value.clone());
        Ok(result)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> KvResult<()> {
        self.entries
            .insert(key.to_string(), StoredValue::new(value, ttl));
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
        ttl: Option<Duration>,
    ) -> KvResult<bool> {
        let now = Instant::now();
        let swapped = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let current = Some(occupied.get())
                    .filter(|stored| stored.is_live(now))
                    .map(|stored| stored.value.as_str());
                if current == expected {
                    occupied.insert(StoredValue::new(value, ttl));
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                if expected.is_none() {
                    vacant.insert(StoredValue::new(value, ttl));
                    true
                } else {
                    false
                }
            }
        };
        Ok(swapped)
    }

    async fn delete(&self, key: &str) -> KvResult<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove(key)
            .map(|(_, stored)| stored.is_live(now))
            .unwrap_or(false))
    }

    async fn delete_if(&self, key: &str, expected: &str) -> KvResult<bool> {
        let now = Instant::now();
        let removed = self
            .entries
            .remove_if(key, |_, stored| stored.is_live(now) && stored.value == expected)
            .is_some();
        Ok(removed)
    }

    async fn scan_prefix(&self, prefix: &str) -> KvResult<Vec<(String, String)>> {
        let now = Instant::now();
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix) && entry.value().is_live(now))
            .map(|entry| (entry.key().clone(), entry.value().value.clone()))
            .collect())
    }

    async fn health_check(&self) -> KvResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "in-memory"
    }
}
