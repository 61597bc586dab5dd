//! Circuit breaker decorator for any [`ManagerGateway`].
//!
//! Only `Unavailable` results count against the breaker; a `NotFound` answer
//! proves the manager is alive. While the circuit is open every call fails
//! immediately with `Unavailable`.

use super::{GatewayError, GatewayResult, ManagerGateway};
use crate::config::CircuitBreakerConfig;
use crate::models::{AssignmentEntity, OrchestratedFlowEntity, StepEntity, WorkflowEntity};
use crate::resilience::{CircuitBreaker, CircuitBreakerError};
use async_trait::async_trait;
use std::future::Future;
use uuid::Uuid;

pub struct CircuitBreakingGateway<G> {
    inner: G,
    breaker: CircuitBreaker,
}

impl<G: ManagerGateway> CircuitBreakingGateway<G> {
    pub fn new(inner: G, config: &CircuitBreakerConfig) -> Self {
        Self {
            inner,
            breaker: CircuitBreaker::new("manager_gateway", config),
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    async fn guarded<'a, T, Fut>(&'a self, operation: &str, call: Fut) -> GatewayResult<T>
    where
        Fut: Future<Output = GatewayResult<T>> + Send + 'a,
    {
        self.breaker
            .call_classified(|| call, GatewayError::is_unavailable)
            .await
            .map_err(|err| match err {
                CircuitBreakerError::CircuitOpen { component } => {
                    GatewayError::unavailable(operation, format!("circuit open for {component}"))
                }
                CircuitBreakerError::OperationFailed(inner) => inner,
            })
    }
}

#[async_trait]
impl<G: ManagerGateway> ManagerGateway for CircuitBreakingGateway<G> {
    async fn get_orchestrated_flow(&self, id: Uuid) -> GatewayResult<OrchestratedFlowEntity> {
        self.guarded("get_orchestrated_flow", self.inner.get_orchestrated_flow(id))
            .await
    }

    async fn get_workflow(&self, id: Uuid) -> GatewayResult<WorkflowEntity> {
        self.guarded("get_workflow", self.inner.get_workflow(id)).await
    }

    async fn get_step(&self, id: Uuid) -> GatewayResult<StepEntity> {
        self.guarded("get_step", self.inner.get_step(id)).await
    }

    async fn get_assignment(&self, id: Uuid) -> GatewayResult<AssignmentEntity> {
        self.guarded("get_assignment", self.inner.get_assignment(id)).await
    }

    async fn get_scheduled_flows(&self) -> GatewayResult<Vec<OrchestratedFlowEntity>> {
        self.guarded("get_scheduled_flows", self.inner.get_scheduled_flows())
            .await
    }

    async fn check_schema_exists(&self, id: Uuid) -> GatewayResult<bool> {
        self.guarded("check_schema_exists", self.inner.check_schema_exists(id))
            .await
    }

    async fn check_step_exists(&self, id: Uuid) -> GatewayResult<bool> {
        self.guarded("check_step_exists", self.inner.check_step_exists(id))
            .await
    }

    async fn check_workflow_references(&self, step_id: Uuid) -> GatewayResult<bool> {
        self.guarded(
            "check_workflow_references",
            self.inner.check_workflow_references(step_id),
        )
        .await
    }
}
