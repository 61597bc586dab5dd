//! Typed orchestration events

use crate::constants::events;
use crate::correlation::CorrelationContext;
use crate::state_machine::ActivityExecutionStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle events produced by the orchestration core.
///
/// Step and flow execution events carry the full correlation context; plan,
/// schedule and registry events are keyed by the flow or registry key they
/// concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum OrchestrationEvent {
    FlowStarted {
        context: CorrelationContext,
        entry_points: Vec<Uuid>,
    },
    FlowCompleted {
        context: CorrelationContext,
        executed: usize,
        failed: usize,
        skipped: usize,
        duration_ms: u64,
    },
    /// The flow terminated before any step was attempted
    FlowFailed {
        flow_id: Uuid,
        error_code: String,
        reason: String,
    },
    StepStarted {
        context: CorrelationContext,
    },
    StepCompleted {
        context: CorrelationContext,
        status: ActivityExecutionStatus,
        duration_ms: u64,
    },
    StepFailed {
        context: CorrelationContext,
        error_code: String,
        reason: String,
    },
    StepSkipped {
        context: CorrelationContext,
        reason: String,
    },
    PlanResolved {
        flow_id: Uuid,
        step_count: usize,
        entry_points: Vec<Uuid>,
        expires_at: DateTime<Utc>,
    },
    PlanInvalidated {
        flow_id: Uuid,
    },
    ScheduleStarted {
        flow_id: Uuid,
        cron_expression: String,
        one_time: bool,
    },
    ScheduleStopped {
        flow_id: Uuid,
    },
    ScheduleFired {
        flow_id: Uuid,
    },
    StatefulPluginRegistered {
        key: String,
    },
    StatefulPluginUnregistered {
        key: String,
    },
}

impl OrchestrationEvent {
    /// Bus topic name for this event
    pub fn name(&self) -> &'static str {
        match self {
            Self::FlowStarted { .. } => events::FLOW_STARTED,
            Self::FlowCompleted { .. } => events::FLOW_COMPLETED,
            Self::FlowFailed { .. } => events::FLOW_FAILED,
            Self::StepStarted { .. } => events::STEP_STARTED,
            Self::StepCompleted { .. } => events::STEP_COMPLETED,
            Self::StepFailed { .. } => events::STEP_FAILED,
            Self::StepSkipped { .. } => events::STEP_SKIPPED,
            Self::PlanResolved { .. } => events::PLAN_RESOLVED,
            Self::PlanInvalidated { .. } => events::PLAN_INVALIDATED,
            Self::ScheduleStarted { .. } => events::SCHEDULE_STARTED,
            Self::ScheduleStopped { .. } => events::SCHEDULE_STOPPED,
            Self::ScheduleFired { .. } => events::SCHEDULE_FIRED,
            Self::StatefulPluginRegistered { .. } => events::PLUGIN_REGISTERED,
            Self::StatefulPluginUnregistered { .. } => events::PLUGIN_UNREGISTERED,
        }
    }

    /// Orchestrated flow this event belongs to, when it belongs to one
    pub fn flow_id(&self) -> Option<Uuid> {
        match self {
            Self::FlowStarted { context, .. }
            | Self::FlowCompleted { context, .. }
            | Self::StepStarted { context }
            | Self::StepCompleted { context, .. }
            | Self::StepFailed { context, .. }
            | Self::StepSkipped { context, .. } => Some(context.orchestrated_flow_id()),
            Self::FlowFailed { flow_id, .. }
            | Self::PlanResolved { flow_id, .. }
            | Self::PlanInvalidated { flow_id }
            | Self::ScheduleStarted { flow_id, .. }
            | Self::ScheduleStopped { flow_id }
            | Self::ScheduleFired { flow_id } => Some(*flow_id),
            Self::StatefulPluginRegistered { .. } | Self::StatefulPluginUnregistered { .. } => None,
        }
    }

    /// Step this event belongs to, for step-level events
    pub fn step_id(&self) -> Option<Uuid> {
        match self {
            Self::StepStarted { context }
            | Self::StepCompleted { context, .. }
            | Self::StepFailed { context, .. }
            | Self::StepSkipped { context, .. } => context.step_id(),
            _ => None,
        }
    }
}

/// Event envelope as delivered to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedEvent {
    pub publish_id: Uuid,
    pub name: String,
    pub event: OrchestrationEvent,
    pub published_at: DateTime<Utc>,
}

impl PublishedEvent {
    pub fn new(event: OrchestrationEvent) -> Self {
        Self {
            publish_id: Uuid::new_v4(),
            name: event.name().to_string(),
            event,
            published_at: Utc::now(),
        }
    }
}
