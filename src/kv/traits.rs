//! Key-value store trait definition

use super::errors::KvResult;
use async_trait::async_trait;
use std::time::Duration;

/// Shared key-value store backing the orchestration cache and the stateful
/// plugin registry.
///
/// Every single-key operation is atomic. Operations spanning several keys
/// carry no transactional guarantee.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns `Ok(Some(value))` on hit, `Ok(None)` on miss or expired entry
    async fn get(&self, key: &str) -> KvResult<Option<String>>;

    /// Unconditional upsert; `None` TTL never expires
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> KvResult<()>;

    /// Replace the value only when the current value equals `expected`
    /// (`None` meaning "absent or expired"). Returns whether the swap happened.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
        ttl: Option<Duration>,
    ) -> KvResult<bool>;

    /// Remove a key; returns whether a live entry was removed
    async fn delete(&self, key: &str) -> KvResult<bool>;

    /// Remove a key only while its live value equals `expected`
    async fn delete_if(&self, key: &str, expected: &str) -> KvResult<bool>;

    /// All live entries whose key starts with `prefix`
    async fn scan_prefix(&self, prefix: &str) -> KvResult<Vec<(String, String)>>;

    /// Check if the store backend is healthy
    async fn health_check(&self) -> KvResult<bool>;

    /// Name of the store provider
    fn provider_name(&self) -> &'static str;
}
