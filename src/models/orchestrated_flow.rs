use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A schedulable instantiation of a workflow with its assignments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratedFlowEntity {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    pub workflow_id: Uuid,
    #[serde(default)]
    pub assignment_ids: Vec<Uuid>,
    /// Six-field cron expression; present only when scheduling is desired
    #[serde(default)]
    pub cron_expression: Option<String>,
    #[serde(default)]
    pub is_schedule_enabled: bool,
    /// Scheduler deactivates the job after its first firing
    #[serde(default)]
    pub is_one_time_execution: bool,
}

impl OrchestratedFlowEntity {
    pub fn new(id: Uuid, workflow_id: Uuid) -> Self {
        Self {
            id,
            name: String::new(),
            workflow_id,
            assignment_ids: Vec::new(),
            cron_expression: None,
            is_schedule_enabled: false,
            is_one_time_execution: false,
        }
    }

    pub fn with_assignments(mut self, assignment_ids: Vec<Uuid>) -> Self {
        self.assignment_ids = assignment_ids;
        self
    }

    pub fn with_schedule(mut self, cron_expression: impl Into<String>, one_time: bool) -> Self {
        self.cron_expression = Some(cron_expression.into());
        self.is_schedule_enabled = true;
        self.is_one_time_execution = one_time;
        self
    }

    /// Cron expression to schedule with, when scheduling is enabled
    pub fn active_schedule(&self) -> Option<&str> {
        if self.is_schedule_enabled {
            self.cron_expression.as_deref()
        } else {
            None
        }
    }
}
