//! Shared fixtures for the integration tests

#![allow(dead_code)]

pub mod plugins;

use async_trait::async_trait;
use flow_orchestrator::config::{CacheConfig, ExecutionConfig, PluginConfig};
use flow_orchestrator::events::EventPublisher;
use flow_orchestrator::gateway::InMemoryManagerGateway;
use flow_orchestrator::kv::{InMemoryKeyValueStore, KeyValueStore, KvError, KvResult};
use flow_orchestrator::models::{
    AssignmentEntity, OrchestratedFlowEntity, PluginLoaderConfiguration, StepEntity,
    WorkflowEntity,
};
use flow_orchestrator::orchestration::{
    FlowExecutor, FlowTrigger, OrchestrationCache, PluginExecutor, WorkflowGraphResolver,
};
use flow_orchestrator::registry::{PluginFactory, StatefulPluginRegistry};
use flow_orchestrator::state_machine::StepEntryCondition;
use flow_orchestrator::OrchestrationResult;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const ASSEMBLY: &str = "test-plugins";
pub const VERSION: &str = "1.0.0";

pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_test_writer()
        .try_init();
}

pub fn plugin_config(type_name: &str) -> PluginLoaderConfiguration {
    PluginLoaderConfiguration::new(ASSEMBLY, VERSION, type_name)
}

/// Builder for a flow graph seeded into an in-memory gateway
pub struct FlowBuilder {
    gateway: Arc<InMemoryManagerGateway>,
    steps: Vec<StepEntity>,
    assignments: Vec<AssignmentEntity>,
    declared: Vec<Uuid>,
    schedule: Option<(String, bool)>,
}

impl FlowBuilder {
    pub fn new(gateway: Arc<InMemoryManagerGateway>) -> Self {
        Self {
            gateway,
            steps: Vec::new(),
            assignments: Vec::new(),
            declared: Vec::new(),
            schedule: None,
        }
    }

    /// Add a step running the given plugin type; returns its id
    pub fn step(
        &mut self,
        plugin_type: &str,
        condition: StepEntryCondition,
        next: Vec<Uuid>,
    ) -> Uuid {
        self.step_with_config(plugin_config(plugin_type), condition, next)
    }

    pub fn step_with_config(
        &mut self,
        config: PluginLoaderConfiguration,
        condition: StepEntryCondition,
        next: Vec<Uuid>,
    ) -> Uuid {
        let step = StepEntity::new(Uuid::new_v4(), Uuid::new_v4())
            .with_entry_condition(condition)
            .with_next_steps(next);
        let assignment = AssignmentEntity::new(Uuid::new_v4(), step.id).with_plugin(config);
        let id = step.id;
        self.declared.push(id);
        self.steps.push(step);
        self.assignments.push(assignment);
        id
    }

    pub fn scheduled(mut self, cron_expression: &str, one_time: bool) -> Self {
        self.schedule = Some((cron_expression.to_string(), one_time));
        self
    }

    /// Seed everything and return the flow id
    pub fn build(self) -> Uuid {
        let workflow = WorkflowEntity::new(Uuid::new_v4(), self.declared);
        let mut flow = OrchestratedFlowEntity::new(Uuid::new_v4(), workflow.id)
            .with_assignments(self.assignments.iter().map(|a| a.id).collect());
        if let Some((cron, one_time)) = self.schedule {
            flow = flow.with_schedule(cron, one_time);
        }
        let flow_id = flow.id;

        for step in self.steps {
            self.gateway.insert_step(step);
        }
        for assignment in self.assignments {
            self.gateway.insert_assignment(assignment);
        }
        self.gateway.insert_workflow(workflow);
        self.gateway.insert_flow(flow);
        flow_id
    }
}

pub fn fast_cache_config() -> CacheConfig {
    CacheConfig {
        lease_poll_interval_ms: 10,
        ..CacheConfig::default()
    }
}

pub fn cache_over(
    gateway: Arc<InMemoryManagerGateway>,
    store: Arc<dyn KeyValueStore>,
) -> OrchestrationCache {
    OrchestrationCache::new(
        store,
        Arc::new(WorkflowGraphResolver::new(gateway)),
        fast_cache_config(),
    )
}

/// Fully wired executor stack over in-memory collaborators
pub struct Harness {
    pub gateway: Arc<InMemoryManagerGateway>,
    pub store: Arc<InMemoryKeyValueStore>,
    pub factory: Arc<PluginFactory>,
    pub registry: Arc<StatefulPluginRegistry>,
    pub plugins: Arc<PluginExecutor>,
    pub events: EventPublisher,
    pub executor: Arc<FlowExecutor>,
}

impl Harness {
    pub fn new(factory: PluginFactory) -> Self {
        Self::with_plugin_config(factory, PluginConfig::default())
    }

    pub fn with_plugin_config(factory: PluginFactory, plugin_config: PluginConfig) -> Self {
        let gateway = Arc::new(InMemoryManagerGateway::new());
        let store = Arc::new(InMemoryKeyValueStore::new());
        let factory = Arc::new(factory);
        let events = EventPublisher::new(256);
        let registry = Arc::new(StatefulPluginRegistry::new(
            store.clone(),
            plugin_config.registry_key_prefix.clone(),
        ));
        let plugins = Arc::new(PluginExecutor::new(
            factory.clone(),
            registry.clone(),
            plugin_config,
        ));
        let cache = cache_over(gateway.clone(), store.clone()).with_events(events.clone());
        let executor = Arc::new(FlowExecutor::new(
            cache,
            plugins.clone(),
            events.clone(),
            ExecutionConfig::default(),
        ));

        Self {
            gateway,
            store,
            factory,
            registry,
            plugins,
            events,
            executor,
        }
    }

    pub fn flow(&self) -> FlowBuilder {
        FlowBuilder::new(self.gateway.clone())
    }
}

/// Trigger that records every dispatched flow
#[derive(Default)]
pub struct RecordingTrigger {
    fired: Mutex<Vec<Uuid>>,
}

impl RecordingTrigger {
    pub fn fired(&self) -> Vec<Uuid> {
        self.fired.lock().clone()
    }

    pub fn count_for(&self, flow_id: Uuid) -> usize {
        self.fired.lock().iter().filter(|id| **id == flow_id).count()
    }
}

#[async_trait]
impl FlowTrigger for RecordingTrigger {
    async fn trigger(&self, flow_id: Uuid) -> OrchestrationResult<()> {
        self.fired.lock().push(flow_id);
        Ok(())
    }
}

/// Store wrapper that can be switched into a failing state
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryKeyValueStore,
    failing: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> KvResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(KvError::ConnectionError("store offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> KvResult<()> {
        self.check()?;
        self.inner.set(key, value, ttl).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
        ttl: Option<Duration>,
    ) -> KvResult<bool> {
        self.check()?;
        self.inner.compare_and_swap(key, expected, value, ttl).await
    }

    async fn delete(&self, key: &str) -> KvResult<bool> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn delete_if(&self, key: &str, expected: &str) -> KvResult<bool> {
        self.check()?;
        self.inner.delete_if(key, expected).await
    }

    async fn scan_prefix(&self, prefix: &str) -> KvResult<Vec<(String, String)>> {
        self.check()?;
        self.inner.scan_prefix(prefix).await
    }

    async fn health_check(&self) -> KvResult<bool> {
        Ok(!self.failing.load(Ordering::SeqCst))
    }

    fn provider_name(&self) -> &'static str {
        "flaky"
    }
}
