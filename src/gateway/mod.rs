//! # Manager Gateway
//!
//! The orchestration core reads entity definitions from the external entity
//! managers exclusively through [`ManagerGateway`]. Every operation may fail
//! with [`GatewayError::Unavailable`] or [`GatewayError::NotFound`];
//! unavailability is always fail-closed for the dependent operation.

pub mod circuit_breaking;
pub mod in_memory;

pub use circuit_breaking::CircuitBreakingGateway;
pub use in_memory::InMemoryManagerGateway;

use crate::error::OrchestrationError;
use crate::models::{AssignmentEntity, OrchestratedFlowEntity, StepEntity, WorkflowEntity};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Network failure or manager service down
    #[error("Manager unavailable during {operation}: {reason}")]
    Unavailable { operation: String, reason: String },

    #[error("{entity_type} {id} not found")]
    NotFound { entity_type: &'static str, id: Uuid },
}

impl GatewayError {
    pub fn unavailable(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

impl From<GatewayError> for OrchestrationError {
    fn from(error: GatewayError) -> Self {
        match error {
            GatewayError::Unavailable { operation, reason } => {
                OrchestrationError::UpstreamUnavailable { operation, reason }
            }
            GatewayError::NotFound { entity_type, id } => OrchestrationError::NotFound {
                entity_type: entity_type.to_string(),
                id,
            },
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Request/response view of the entity managers
#[async_trait]
pub trait ManagerGateway: Send + Sync {
    async fn get_orchestrated_flow(&self, id: Uuid) -> GatewayResult<OrchestratedFlowEntity>;

    async fn get_workflow(&self, id: Uuid) -> GatewayResult<WorkflowEntity>;

    async fn get_step(&self, id: Uuid) -> GatewayResult<StepEntity>;

    async fn get_assignment(&self, id: Uuid) -> GatewayResult<AssignmentEntity>;

    /// Every orchestrated flow whose schedule is enabled
    async fn get_scheduled_flows(&self) -> GatewayResult<Vec<OrchestratedFlowEntity>>;

    async fn check_schema_exists(&self, id: Uuid) -> GatewayResult<bool>;

    async fn check_step_exists(&self, id: Uuid) -> GatewayResult<bool>;

    /// Whether any workflow still references the step
    async fn check_workflow_references(&self, step_id: Uuid) -> GatewayResult<bool>;
}

#[async_trait]
impl<T: ManagerGateway + ?Sized> ManagerGateway for Arc<T> {
    async fn get_orchestrated_flow(&self, id: Uuid) -> GatewayResult<OrchestratedFlowEntity> {
        (**self).get_orchestrated_flow(id).await
    }

    async fn get_workflow(&self, id: Uuid) -> GatewayResult<WorkflowEntity> {
        (**self).get_workflow(id).await
    }

    async fn get_step(&self, id: Uuid) -> GatewayResult<StepEntity> {
        (**self).get_step(id).await
    }

    async fn get_assignment(&self, id: Uuid) -> GatewayResult<AssignmentEntity> {
        (**self).get_assignment(id).await
    }

    async fn get_scheduled_flows(&self) -> GatewayResult<Vec<OrchestratedFlowEntity>> {
        (**self).get_scheduled_flows().await
    }

    async fn check_schema_exists(&self, id: Uuid) -> GatewayResult<bool> {
        (**self).check_schema_exists(id).await
    }

    async fn check_step_exists(&self, id: Uuid) -> GatewayResult<bool> {
        (**self).check_step_exists(id).await
    }

    async fn check_workflow_references(&self, step_id: Uuid) -> GatewayResult<bool> {
        (**self).check_workflow_references(step_id).await
    }
}
