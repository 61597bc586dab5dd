//! # Orchestration Bootstrap
//!
//! Wires every component from one configuration: the (optionally
//! circuit-broken) manager gateway, plan cache, stateful plugin registry,
//! plugin executor, flow executor and scheduler.
//!
//! ```rust,no_run
//! use flow_orchestrator::config::ConfigManager;
//! use flow_orchestrator::gateway::InMemoryManagerGateway;
//! use flow_orchestrator::kv::InMemoryKeyValueStore;
//! use flow_orchestrator::orchestration::OrchestrationCore;
//! use flow_orchestrator::registry::PluginFactory;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let core = OrchestrationCore::bootstrap(
//!     ConfigManager::load(None)?,
//!     Arc::new(InMemoryManagerGateway::new()),
//!     Arc::new(InMemoryKeyValueStore::new()),
//!     Arc::new(PluginFactory::new()),
//! )?;
//! let report = core.start().await?;
//! # Ok(())
//! # }
//! ```

use super::flow_executor::FlowExecutor;
use super::graph_resolver::WorkflowGraphResolver;
use super::orchestration_cache::{CacheStats, OrchestrationCache};
use super::plugin_executor::{PluginCacheStats, PluginExecutor, PreloadReport};
use super::scheduler::{FlowScheduler, RecoveryReport};
use crate::config::ConfigManager;
use crate::error::OrchestrationResult;
use crate::events::EventPublisher;
use crate::gateway::{CircuitBreakingGateway, ManagerGateway};
use crate::kv::KeyValueStore;
use crate::registry::{PluginFactory, StatefulPluginRegistry};
use crate::resilience::CircuitState;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Point-in-time view of the running core
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub environment: String,
    pub circuit_breaker_state: Option<CircuitState>,
    pub scheduled_flows: usize,
    pub event_subscribers: usize,
    pub cache: CacheStats,
    pub plugins: PluginCacheStats,
}

pub struct OrchestrationCore {
    config_manager: Arc<ConfigManager>,
    breaker_gateway: Option<Arc<CircuitBreakingGateway<Arc<dyn ManagerGateway>>>>,
    gateway: Arc<dyn ManagerGateway>,
    events: EventPublisher,
    registry: Arc<StatefulPluginRegistry>,
    plugin_executor: Arc<PluginExecutor>,
    flow_executor: Arc<FlowExecutor>,
    scheduler: FlowScheduler,
}

impl OrchestrationCore {
    pub fn bootstrap(
        config_manager: Arc<ConfigManager>,
        gateway: Arc<dyn ManagerGateway>,
        store: Arc<dyn KeyValueStore>,
        factory: Arc<PluginFactory>,
    ) -> OrchestrationResult<Self> {
        let config = config_manager.config().clone();
        config.validate()?;

        let (gateway, breaker_gateway) = if config.circuit_breaker.enabled {
            let wrapped = Arc::new(CircuitBreakingGateway::new(gateway, &config.circuit_breaker));
            (wrapped.clone() as Arc<dyn ManagerGateway>, Some(wrapped))
        } else {
            (gateway, None)
        };

        let events = EventPublisher::new(config.events.channel_capacity);
        let resolver = Arc::new(WorkflowGraphResolver::new(gateway.clone()));
        let cache = OrchestrationCache::new(store.clone(), resolver, config.cache.clone())
            .with_events(events.clone());

        let registry = Arc::new(
            StatefulPluginRegistry::new(store, config.plugins.registry_key_prefix.clone())
                .with_events(events.clone()),
        );
        let plugin_executor = Arc::new(PluginExecutor::new(
            factory,
            registry.clone(),
            config.plugins.clone(),
        ));
        let flow_executor = Arc::new(FlowExecutor::new(
            cache,
            plugin_executor.clone(),
            events.clone(),
            config.execution.clone(),
        ));
        let scheduler = FlowScheduler::new(
            flow_executor.clone(),
            gateway.clone(),
            config.scheduler.clone(),
        )
        .with_events(events.clone());

        info!(
            environment = %config_manager.environment(),
            circuit_breaker = config.circuit_breaker.enabled,
            "🚀 Orchestration core bootstrapped"
        );

        Ok(Self {
            config_manager,
            breaker_gateway,
            gateway,
            events,
            registry,
            plugin_executor,
            flow_executor,
            scheduler,
        })
    }

    /// Recover schedules when configured to; returns the recovery report
    pub async fn start(&self) -> OrchestrationResult<Option<RecoveryReport>> {
        let scheduler = &self.config_manager.config().scheduler;
        if scheduler.enabled && scheduler.recover_on_startup {
            Ok(Some(self.scheduler.recover().await?))
        } else {
            Ok(None)
        }
    }

    /// Warm a processor's stateful plugins before it accepts work
    pub async fn preload_for_processor(&self, processor_id: Uuid) -> OrchestrationResult<PreloadReport> {
        self.plugin_executor.preload_for_processor(processor_id).await
    }

    pub fn shutdown(&self) {
        self.scheduler.shutdown();
        info!("🛑 Orchestration core shut down");
    }

    pub fn gateway(&self) -> &Arc<dyn ManagerGateway> {
        &self.gateway
    }

    pub fn events(&self) -> &EventPublisher {
        &self.events
    }

    pub fn registry(&self) -> &Arc<StatefulPluginRegistry> {
        &self.registry
    }

    pub fn plugin_executor(&self) -> &Arc<PluginExecutor> {
        &self.plugin_executor
    }

    pub fn flow_executor(&self) -> &Arc<FlowExecutor> {
        &self.flow_executor
    }

    pub fn scheduler(&self) -> &FlowScheduler {
        &self.scheduler
    }

    pub fn status(&self) -> SystemStatus {
        SystemStatus {
            environment: self.config_manager.environment().to_string(),
            circuit_breaker_state: self.breaker_gateway.as_ref().map(|g| g.breaker().state()),
            scheduled_flows: self.scheduler.scheduled_flows().len(),
            event_subscribers: self.events.subscriber_count(),
            cache: self.flow_executor.cache().stats(),
            plugins: self.plugin_executor.cache_stats(),
        }
    }
}
