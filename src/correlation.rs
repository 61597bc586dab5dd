//! # Correlation Context
//!
//! Immutable six-layer identifier tuple threaded through every orchestration
//! call for log, event and cache correlation:
//!
//! ```text
//! OrchestratedFlowId → WorkflowId → CorrelationId → StepId → ProcessorId → ExecutionId/PublishId
//! ```
//!
//! Contexts are plain values passed explicitly through signatures. Narrowing to
//! a deeper layer returns a new context; nothing is ever mutated in place, so a
//! context can be shared freely across tasks.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationContext {
    orchestrated_flow_id: Uuid,
    workflow_id: Uuid,
    correlation_id: Uuid,
    step_id: Option<Uuid>,
    processor_id: Option<Uuid>,
    execution_id: Option<Uuid>,
    publish_id: Option<Uuid>,
}

impl CorrelationContext {
    /// Start a new correlation for one execution of an orchestrated flow
    pub fn new(orchestrated_flow_id: Uuid, workflow_id: Uuid) -> Self {
        Self::with_correlation_id(orchestrated_flow_id, workflow_id, Uuid::new_v4())
    }

    /// Rebuild a flow-level context from an existing correlation id
    pub fn with_correlation_id(
        orchestrated_flow_id: Uuid,
        workflow_id: Uuid,
        correlation_id: Uuid,
    ) -> Self {
        Self {
            orchestrated_flow_id,
            workflow_id,
            correlation_id,
            step_id: None,
            processor_id: None,
            execution_id: None,
            publish_id: None,
        }
    }

    /// Narrow to a step executed by a processor
    pub fn for_step(&self, step_id: Uuid, processor_id: Uuid) -> Self {
        Self {
            step_id: Some(step_id),
            processor_id: Some(processor_id),
            execution_id: None,
            publish_id: None,
            ..self.clone()
        }
    }

    /// Narrow to one execution attempt
    pub fn with_execution(&self, execution_id: Uuid) -> Self {
        Self {
            execution_id: Some(execution_id),
            ..self.clone()
        }
    }

    /// Attach the identifier of a published message
    pub fn with_publish(&self, publish_id: Uuid) -> Self {
        Self {
            publish_id: Some(publish_id),
            ..self.clone()
        }
    }

    pub fn orchestrated_flow_id(&self) -> Uuid {
        self.orchestrated_flow_id
    }

    pub fn workflow_id(&self) -> Uuid {
        self.workflow_id
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn step_id(&self) -> Option<Uuid> {
        self.step_id
    }

    pub fn processor_id(&self) -> Option<Uuid> {
        self.processor_id
    }

    pub fn execution_id(&self) -> Option<Uuid> {
        self.execution_id
    }

    pub fn publish_id(&self) -> Option<Uuid> {
        self.publish_id
    }

    /// Tracing span carrying every populated layer
    pub fn span(&self, name: &'static str) -> tracing::Span {
        tracing::info_span!(
            "orchestration",
            operation = name,
            orchestrated_flow_id = %self.orchestrated_flow_id,
            workflow_id = %self.workflow_id,
            correlation_id = %self.correlation_id,
            step_id = ?self.step_id,
            processor_id = ?self.processor_id,
            execution_id = ?self.execution_id,
            publish_id = ?self.publish_id,
        )
    }
}

impl fmt::Display for CorrelationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.orchestrated_flow_id, self.workflow_id, self.correlation_id
        )?;
        if let Some(step_id) = self.step_id {
            write!(f, "/{step_id}")?;
        }
        if let Some(processor_id) = self.processor_id {
            write!(f, "/{processor_id}")?;
        }
        if let Some(id) = self.execution_id.or(self.publish_id) {
            write!(f, "/{id}")?;
        }
        Ok(())
    }
}
