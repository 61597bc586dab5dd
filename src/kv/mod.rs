//! # Shared Key-Value Store
//!
//! Store abstraction for the two pieces of fleet-shared mutable state: the
//! orchestration cache and the stateful plugin registry.
//!
//! ```text
//! KeyValueStore (trait)           <- get / set / compare_and_swap / delete / scan_prefix
//!   └── InMemoryKeyValueStore     <- DashMap, per-entry TTL, embedded deployments and tests
//! ```
//!
//! Unlike a best-effort cache, failures here are never swallowed: callers map
//! [`KvError`] to `OrchestrationError::StoreUnavailable` and reject the
//! operation.

pub mod errors;
pub mod in_memory;
pub mod traits;

pub use errors::{KvError, KvResult};
pub use in_memory::InMemoryKeyValueStore;
pub use traits::KeyValueStore;

use crate::error::OrchestrationError;

impl KvError {
    /// Fail-closed conversion tagging which store failed
    pub fn into_orchestration_error(self, store: &str) -> OrchestrationError {
        OrchestrationError::StoreUnavailable {
            store: store.to_string(),
            reason: self.to_string(),
        }
    }
}
