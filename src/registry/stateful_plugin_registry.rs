//! # Stateful Plugin Registry
//!
//! Fleet-wide record of which plugin instances must be kept alive and reused
//! across invocations. Entries live in the shared key-value store under
//! `<prefix>:<processor_id>:<assembly>:<version>:<type>` (components escaped
//! so `:` appears only as the separator), so a restarted
//! processor can list what it owns and rebuild those instances.
//!
//! Register and unregister are single-key operations and therefore atomic;
//! listing scans a prefix and carries no snapshot guarantee.

use crate::error::OrchestrationResult;
use crate::events::{EventPublisher, OrchestrationEvent};
use crate::kv::KeyValueStore;
use crate::logging::log_registry_operation;
use crate::models::{StatefulPluginKey, StatefulPluginMetadata};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

const STORE_NAME: &str = "stateful_plugin_registry";

pub struct StatefulPluginRegistry {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
    events: Option<EventPublisher>,
}

impl StatefulPluginRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventPublisher) -> Self {
        self.events = Some(events);
        self
    }

    fn storage_key(&self, key: &StatefulPluginKey) -> String {
        format!("{}:{}", self.prefix, key.key_string())
    }

    /// Idempotent upsert of a registry entry
    pub async fn register(&self, metadata: &StatefulPluginMetadata) -> OrchestrationResult<()> {
        let key = metadata.key();
        let payload = serde_json::to_string(metadata)?;
        self.store
            .set(&self.storage_key(&key), &payload, None)
            .await
            .map_err(|e| e.into_orchestration_error(STORE_NAME))?;

        log_registry_operation("register", &key.key_string(), "success", None);
        if let Some(events) = &self.events {
            events.publish(OrchestrationEvent::StatefulPluginRegistered {
                key: key.key_string(),
            });
        }
        Ok(())
    }

    /// Idempotent removal; returns whether an entry existed
    pub async fn unregister(&self, key: &StatefulPluginKey) -> OrchestrationResult<bool> {
        let removed = self
            .store
            .delete(&self.storage_key(key))
            .await
            .map_err(|e| e.into_orchestration_error(STORE_NAME))?;

        let status = if removed { "success" } else { "absent" };
        log_registry_operation("unregister", &key.key_string(), status, None);
        if removed {
            if let Some(events) = &self.events {
                events.publish(OrchestrationEvent::StatefulPluginUnregistered {
                    key: key.key_string(),
                });
            }
        }
        Ok(removed)
    }

    /// Effective statefulness of a plugin key; store failures are surfaced,
    /// never read as "stateless"
    pub async fn is_stateful(&self, key: &StatefulPluginKey) -> OrchestrationResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    pub async fn get(
        &self,
        key: &StatefulPluginKey,
    ) -> OrchestrationResult<Option<StatefulPluginMetadata>> {
        let raw = self
            .store
            .get(&self.storage_key(key))
            .await
            .map_err(|e| e.into_orchestration_error(STORE_NAME))?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Every registered entry, for administrative inspection
    pub async fn list_all(&self) -> OrchestrationResult<Vec<StatefulPluginMetadata>> {
        self.scan(&format!("{}:", self.prefix)).await
    }

    /// Entries owned by one processor
    pub async fn list_for_processor(
        &self,
        processor_id: Uuid,
    ) -> OrchestrationResult<Vec<StatefulPluginMetadata>> {
        self.scan(&format!("{}:{}:", self.prefix, processor_id)).await
    }

    async fn scan(&self, prefix: &str) -> OrchestrationResult<Vec<StatefulPluginMetadata>> {
        let entries = self
            .store
            .scan_prefix(prefix)
            .await
            .map_err(|e| e.into_orchestration_error(STORE_NAME))?;

        let mut result = Vec::with_capacity(entries.len());
        for (key, raw) in entries {
            match serde_json::from_str::<StatefulPluginMetadata>(&raw) {
                Ok(metadata) => result.push(metadata),
                Err(err) => warn!(key = %key, error = %err, "Skipping undecodable registry entry"),
            }
        }
        debug!(prefix, count = result.len(), "Scanned stateful plugin registry");
        Ok(result)
    }
}
