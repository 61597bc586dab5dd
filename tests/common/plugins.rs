//! Test plugins with controllable behavior

use anyhow::anyhow;
use async_trait::async_trait;
use flow_orchestrator::models::ProcessedActivityData;
use flow_orchestrator::registry::{Plugin, PluginFactory};
use flow_orchestrator::state_machine::ActivityExecutionStatus;
use flow_orchestrator::CorrelationContext;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{ASSEMBLY, VERSION};

/// Reports a fixed status and counts its invocations on this instance
pub struct StatusPlugin {
    status: ActivityExecutionStatus,
    calls: AtomicUsize,
}

impl StatusPlugin {
    pub fn new(status: ActivityExecutionStatus) -> Self {
        Self {
            status,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Plugin for StatusPlugin {
    async fn process(&self, context: CorrelationContext, input: Value) -> anyhow::Result<ProcessedActivityData> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ProcessedActivityData::new(
            self.status,
            json!({ "step_id": context.step_id(), "call": call, "input": input }),
        ))
    }
}

pub struct SleepingPlugin {
    delay: Duration,
}

#[async_trait]
impl Plugin for SleepingPlugin {
    async fn process(&self, _context: CorrelationContext, _input: Value) -> anyhow::Result<ProcessedActivityData> {
        tokio::time::sleep(self.delay).await;
        Ok(ProcessedActivityData::completed(Value::Null))
    }
}

pub struct ErrorPlugin;

#[async_trait]
impl Plugin for ErrorPlugin {
    async fn process(&self, _context: CorrelationContext, _input: Value) -> anyhow::Result<ProcessedActivityData> {
        Err(anyhow!("downstream rejected the batch"))
    }
}

pub struct PanickingPlugin;

#[async_trait]
impl Plugin for PanickingPlugin {
    async fn process(&self, _context: CorrelationContext, _input: Value) -> anyhow::Result<ProcessedActivityData> {
        panic!("plugin blew up");
    }
}

/// Register a status plugin; `constructions` counts instances built
pub fn register_status(
    factory: &PluginFactory,
    type_name: &str,
    status: ActivityExecutionStatus,
    constructions: Arc<AtomicUsize>,
) {
    factory.register(ASSEMBLY, VERSION, type_name, move || {
        constructions.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(StatusPlugin::new(status)) as Arc<dyn Plugin>)
    });
}

pub fn register_sleeping(factory: &PluginFactory, type_name: &str, delay: Duration) {
    factory.register(ASSEMBLY, VERSION, type_name, move || {
        Ok(Arc::new(SleepingPlugin { delay }) as Arc<dyn Plugin>)
    });
}

pub fn register_error(factory: &PluginFactory, type_name: &str) {
    factory.register(ASSEMBLY, VERSION, type_name, || {
        Ok(Arc::new(ErrorPlugin) as Arc<dyn Plugin>)
    });
}

pub fn register_panicking(factory: &PluginFactory, type_name: &str) {
    factory.register(ASSEMBLY, VERSION, type_name, || {
        Ok(Arc::new(PanickingPlugin) as Arc<dyn Plugin>)
    });
}

/// Factory with the plugin types most tests need
pub fn standard_factory() -> PluginFactory {
    let factory = PluginFactory::new();
    let unused = Arc::new(AtomicUsize::new(0));
    register_status(&factory, "Complete", ActivityExecutionStatus::Completed, unused.clone());
    register_status(&factory, "Fail", ActivityExecutionStatus::Failed, unused.clone());
    register_status(&factory, "Cancel", ActivityExecutionStatus::Cancelled, unused);
    register_error(&factory, "Error");
    register_panicking(&factory, "Panic");
    factory
}
