//! Embedded manager gateway backed by in-process maps.
//!
//! Used for single-process deployments and throughout the test suite. An
//! availability switch simulates a manager outage and per-operation counters
//! make upstream load observable.

use super::{GatewayError, GatewayResult, ManagerGateway};
use crate::models::{AssignmentEntity, OrchestratedFlowEntity, StepEntity, WorkflowEntity};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use uuid::Uuid;

/// Calls served per operation
#[derive(Debug, Default)]
pub struct GatewayCallCounters {
    pub orchestrated_flow: AtomicU64,
    pub workflow: AtomicU64,
    pub step: AtomicU64,
    pub assignment: AtomicU64,
    pub scheduled_flows: AtomicU64,
    pub reference_checks: AtomicU64,
}

impl GatewayCallCounters {
    pub fn total(&self) -> u64 {
        [
            &self.orchestrated_flow,
            &self.workflow,
            &self.step,
            &self.assignment,
            &self.scheduled_flows,
            &self.reference_checks,
        ]
        .iter()
        .map(|c| c.load(Ordering::Relaxed))
        .sum()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryManagerGateway {
    flows: RwLock<HashMap<Uuid, OrchestratedFlowEntity>>,
    workflows: RwLock<HashMap<Uuid, WorkflowEntity>>,
    steps: RwLock<HashMap<Uuid, StepEntity>>,
    assignments: RwLock<HashMap<Uuid, AssignmentEntity>>,
    schemas: RwLock<HashSet<Uuid>>,
    unavailable: AtomicBool,
    latency: RwLock<Option<Duration>>,
    counters: GatewayCallCounters,
}

impl InMemoryManagerGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_flow(&self, flow: OrchestratedFlowEntity) {
        self.flows.write().insert(flow.id, flow);
    }

    pub fn insert_workflow(&self, workflow: WorkflowEntity) {
        self.workflows.write().insert(workflow.id, workflow);
    }

    pub fn insert_step(&self, step: StepEntity) {
        self.steps.write().insert(step.id, step);
    }

    pub fn insert_assignment(&self, assignment: AssignmentEntity) {
        self.assignments.write().insert(assignment.id, assignment);
    }

    pub fn insert_schema(&self, schema_id: Uuid) {
        self.schemas.write().insert(schema_id);
    }

    pub fn remove_step(&self, step_id: Uuid) -> Option<StepEntity> {
        self.steps.write().remove(&step_id)
    }

    /// Simulate a manager outage (`false`) or recovery (`true`)
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Delay every call, to widen race windows in tests
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write() = latency;
    }

    pub fn counters(&self) -> &GatewayCallCounters {
        &self.counters
    }

    async fn enter(&self, operation: &str, counter: &AtomicU64) -> GatewayResult<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.read();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GatewayError::unavailable(operation, "manager service unreachable"));
        }
        Ok(())
    }
}

#[async_trait]
impl ManagerGateway for InMemoryManagerGateway {
    async fn get_orchestrated_flow(&self, id: Uuid) -> GatewayResult<OrchestratedFlowEntity> {
        self.enter("get_orchestrated_flow", &self.counters.orchestrated_flow).await?;
        self.flows.read().get(&id).cloned().ok_or(GatewayError::NotFound {
            entity_type: "orchestrated_flow",
            id,
        })
    }

    async fn get_workflow(&self, id: Uuid) -> GatewayResult<WorkflowEntity> {
        self.enter("get_workflow", &self.counters.workflow).await?;
        self.workflows.read().get(&id).cloned().ok_or(GatewayError::NotFound {
            entity_type: "workflow",
            id,
        })
    }

    async fn get_step(&self, id: Uuid) -> GatewayResult<StepEntity> {
        self.enter("get_step", &self.counters.step).await?;
        self.steps.read().get(&id).cloned().ok_or(GatewayError::NotFound {
            entity_type: "step",
            id,
        })
    }

    async fn get_assignment(&self, id: Uuid) -> GatewayResult<AssignmentEntity> {
        self.enter("get_assignment", &self.counters.assignment).await?;
        self.assignments.read().get(&id).cloned().ok_or(GatewayError::NotFound {
            entity_type: "assignment",
            id,
        })
    }

    async fn get_scheduled_flows(&self) -> GatewayResult<Vec<OrchestratedFlowEntity>> {
        self.enter("get_scheduled_flows", &self.counters.scheduled_flows).await?;
        Ok(self
            .flows
            .read()
            .values()
            .filter(|flow| flow.is_schedule_enabled)
            .cloned()
            .collect())
    }

    async fn check_schema_exists(&self, id: Uuid) -> GatewayResult<bool> {
        self.enter("check_schema_exists", &self.counters.reference_checks).await?;
        Ok(self.schemas.read().contains(&id))
    }

    async fn check_step_exists(&self, id: Uuid) -> GatewayResult<bool> {
        self.enter("check_step_exists", &self.counters.reference_checks).await?;
        Ok(self.steps.read().contains_key(&id))
    }

    async fn check_workflow_references(&self, step_id: Uuid) -> GatewayResult<bool> {
        self.enter("check_workflow_references", &self.counters.reference_checks).await?;
        Ok(self
            .workflows
            .read()
            .values()
            .any(|workflow| workflow.step_ids.contains(&step_id)))
    }
}
