//! # Plugin Executor
//!
//! Turns a [`PluginLoaderConfiguration`] into a running, isolated invocation.
//!
//! Two cache layers with different keys and lifetimes:
//!
//! - **Loaded types** keyed by `(base path, assembly, version, type)`. Always
//!   cached for the life of the process, whatever the plugin's statefulness.
//! - **Stateful instances** keyed by the registry key. Used only while the
//!   stateful plugin registry holds that key; without an entry every
//!   invocation gets a fresh instance, whatever `is_stateless` says.
//!
//! Each invocation runs on its own task under the configured budget. A
//! timeout aborts the task; an error or panic inside the plugin is reported as
//! `PluginError` and never reaches the caller's task.

use crate::config::PluginConfig;
use crate::correlation::CorrelationContext;
use crate::error::{OrchestrationError, OrchestrationResult};
use crate::models::{
    PluginLoaderConfiguration, ProcessedActivityData, StatefulPluginKey, StatefulPluginMetadata,
};
use crate::registry::{Plugin, PluginConstructor, PluginFactory, PluginTypeKey, StatefulPluginRegistry};
use crate::validation::validate_plugin_configuration;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LoadedTypeKey {
    base_path: String,
    type_key: PluginTypeKey,
}

/// A plugin type resolved for this process
pub struct LoadedPluginType {
    pub type_key: PluginTypeKey,
    pub base_path: String,
    pub loaded_at: DateTime<Utc>,
    constructor: PluginConstructor,
}

impl LoadedPluginType {
    fn instantiate(&self) -> OrchestrationResult<Arc<dyn Plugin>> {
        let load_failure = |reason: String| OrchestrationError::LoadFailure {
            plugin: self.type_key.to_string(),
            reason,
        };
        match catch_unwind(AssertUnwindSafe(|| (self.constructor)())) {
            Ok(Ok(plugin)) => Ok(plugin),
            Ok(Err(err)) => Err(load_failure(format!("{err:#}"))),
            Err(_) => Err(load_failure("constructor panicked".to_string())),
        }
    }
}

/// Both cache layers at a glance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PluginCacheStats {
    pub loaded_types: usize,
    pub cached_instances: usize,
    pub type_loads: u64,
    pub instance_constructions: u64,
}

/// Result of warming a processor's stateful instances
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreloadReport {
    pub processor_id: Uuid,
    pub loaded: Vec<StatefulPluginKey>,
    pub failed: Vec<(StatefulPluginKey, String)>,
}

impl PreloadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct PluginExecutor {
    factory: Arc<PluginFactory>,
    registry: Arc<StatefulPluginRegistry>,
    config: PluginConfig,
    loaded_types: DashMap<LoadedTypeKey, Arc<LoadedPluginType>>,
    instances: DashMap<StatefulPluginKey, Arc<OnceCell<Arc<dyn Plugin>>>>,
    type_loads: AtomicU64,
    instance_constructions: AtomicU64,
}

impl PluginExecutor {
    pub fn new(
        factory: Arc<PluginFactory>,
        registry: Arc<StatefulPluginRegistry>,
        config: PluginConfig,
    ) -> Self {
        Self {
            factory,
            registry,
            config,
            loaded_types: DashMap::new(),
            instances: DashMap::new(),
            type_loads: AtomicU64::new(0),
            instance_constructions: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<StatefulPluginRegistry> {
        &self.registry
    }

    /// Run one plugin invocation within its execution budget.
    ///
    /// The context must be narrowed to a step (it carries the processor id the
    /// registry key is built from).
    pub async fn execute(
        &self,
        config: &PluginLoaderConfiguration,
        context: &CorrelationContext,
        input: serde_json::Value,
    ) -> OrchestrationResult<ProcessedActivityData> {
        let processor_id = context.processor_id().ok_or_else(|| OrchestrationError::LoadFailure {
            plugin: config.display_name(),
            reason: "correlation context carries no processor id".to_string(),
        })?;

        let key = StatefulPluginKey::new(processor_id, config);
        let stateful = self.registry.is_stateful(&key).await?;
        if !stateful && self.instances.remove(&key).is_some() {
            debug!(key = %key, "Evicted instance no longer registered as stateful");
        }

        let loaded = self.load_type(config)?;
        let plugin = self.instance_for(&key, &loaded, stateful).await?;

        let execution_id = Uuid::new_v4();
        let context = context.with_execution(execution_id);
        let budget = self.config.effective_timeout(config.execution_timeout_ms);
        let span = context.span("plugin_execute");

        debug!(
            plugin = %config.display_name(),
            stateful,
            timeout_ms = budget.as_millis() as u64,
            "Invoking plugin"
        );

        let started = Instant::now();
        let mut handle = tokio::spawn(async move { plugin.process(context, input).await }.instrument(span));

        let outcome = match tokio::time::timeout(budget, &mut handle).await {
            Err(_) => {
                handle.abort();
                warn!(plugin = %config.display_name(), timeout_ms = budget.as_millis() as u64, "⏱️ Plugin timed out");
                return Err(OrchestrationError::TimeoutExceeded {
                    operation: config.display_name(),
                    timeout: budget,
                });
            }
            Ok(Err(join_error)) => {
                let reason = if join_error.is_panic() {
                    "plugin panicked during processing".to_string()
                } else {
                    format!("plugin task failed: {join_error}")
                };
                return Err(OrchestrationError::PluginError {
                    plugin: config.display_name(),
                    reason,
                });
            }
            Ok(Ok(result)) => result,
        };

        let mut data = outcome.map_err(|err| OrchestrationError::PluginError {
            plugin: config.display_name(),
            reason: format!("{err:#}"),
        })?;

        data.processor_id.get_or_insert(processor_id);
        data.execution_id = Some(execution_id);
        data.duration_ms = started.elapsed().as_millis() as u64;
        Ok(data)
    }

    /// Resolve a plugin type, memoized per process
    pub fn load_type(&self, config: &PluginLoaderConfiguration) -> OrchestrationResult<Arc<LoadedPluginType>> {
        validate_plugin_configuration(config).map_err(|err| OrchestrationError::LoadFailure {
            plugin: config.display_name(),
            reason: err.to_string(),
        })?;

        let base_path = if config.assembly_base_path.trim().is_empty() {
            self.config.default_assembly_base_path.clone()
        } else {
            config.assembly_base_path.clone()
        };
        let type_key = PluginTypeKey::from_configuration(config);
        let cache_key = LoadedTypeKey {
            base_path: base_path.clone(),
            type_key: type_key.clone(),
        };

        if let Some(loaded) = self.loaded_types.get(&cache_key) {
            return Ok(loaded.clone());
        }

        let constructor = self
            .factory
            .constructor(&type_key)
            .ok_or_else(|| OrchestrationError::LoadFailure {
                plugin: type_key.to_string(),
                reason: format!("type not registered (base path {base_path})"),
            })?;

        let loaded = self
            .loaded_types
            .entry(cache_key)
            .or_insert_with(|| {
                self.type_loads.fetch_add(1, Ordering::Relaxed);
                info!(plugin = %type_key, base_path = %base_path, "📦 Loaded plugin type");
                Arc::new(LoadedPluginType {
                    type_key: type_key.clone(),
                    base_path: base_path.clone(),
                    loaded_at: Utc::now(),
                    constructor,
                })
            })
            .clone();
        Ok(loaded)
    }

    async fn instance_for(
        &self,
        key: &StatefulPluginKey,
        loaded: &LoadedPluginType,
        stateful: bool,
    ) -> OrchestrationResult<Arc<dyn Plugin>> {
        if !stateful {
            return self.construct(loaded);
        }

        let cell = self.instances.entry(key.clone()).or_default().clone();
        let plugin = cell
            .get_or_try_init(|| async { self.construct(loaded) })
            .await?;
        Ok(plugin.clone())
    }

    fn construct(&self, loaded: &LoadedPluginType) -> OrchestrationResult<Arc<dyn Plugin>> {
        let plugin = loaded.instantiate()?;
        self.instance_constructions.fetch_add(1, Ordering::Relaxed);
        Ok(plugin)
    }

    /// Eagerly build every stateful instance a processor owns.
    ///
    /// Restores registrations only; in-memory state from before a restart is
    /// gone.
    pub async fn preload_for_processor(&self, processor_id: Uuid) -> OrchestrationResult<PreloadReport> {
        let entries = self.registry.list_for_processor(processor_id).await?;
        let mut report = PreloadReport {
            processor_id,
            ..PreloadReport::default()
        };

        for metadata in entries {
            let key = metadata.key();
            match self.preload_one(&metadata).await {
                Ok(()) => report.loaded.push(key),
                Err(err) => {
                    warn!(key = %key, error = %err, "Failed to preload stateful plugin");
                    report.failed.push((key, err.to_string()));
                }
            }
        }

        info!(
            processor_id = %processor_id,
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "🔥 Preloaded stateful plugins"
        );
        Ok(report)
    }

    async fn preload_one(&self, metadata: &StatefulPluginMetadata) -> OrchestrationResult<()> {
        let config = metadata.to_configuration(self.config.default_execution_timeout_ms);
        let loaded = self.load_type(&config)?;
        self.instance_for(&metadata.key(), &loaded, true).await?;
        Ok(())
    }

    /// Drop a cached stateful instance; the next stateful invocation rebuilds it
    pub fn evict_instance(&self, key: &StatefulPluginKey) -> bool {
        self.instances.remove(key).is_some()
    }

    pub fn cache_stats(&self) -> PluginCacheStats {
        PluginCacheStats {
            loaded_types: self.loaded_types.len(),
            cached_instances: self
                .instances
                .iter()
                .filter(|entry| entry.value().initialized())
                .count(),
            type_loads: self.type_loads.load(Ordering::Relaxed),
            instance_constructions: self.instance_constructions.load(Ordering::Relaxed),
        }
    }
}
