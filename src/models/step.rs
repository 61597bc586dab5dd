use crate::state_machine::StepEntryCondition;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A node in a workflow graph, bound to the processor that executes it.
///
/// Owned by the external workflow manager; read-only to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepEntity {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    pub processor_id: Uuid,
    #[serde(default)]
    pub next_step_ids: Vec<Uuid>,
    #[serde(default)]
    pub entry_condition: StepEntryCondition,
}

impl StepEntity {
    pub fn new(id: Uuid, processor_id: Uuid) -> Self {
        Self {
            id,
            name: String::new(),
            processor_id,
            next_step_ids: Vec::new(),
            entry_condition: StepEntryCondition::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_next_steps(mut self, next_step_ids: Vec<Uuid>) -> Self {
        self.next_step_ids = next_step_ids;
        self
    }

    pub fn with_entry_condition(mut self, entry_condition: StepEntryCondition) -> Self {
        self.entry_condition = entry_condition;
        self
    }
}
