use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Workflow definition as served by the workflow manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowEntity {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    /// Steps declared by the workflow; successors reachable from these are
    /// pulled in during resolution even when not listed here
    #[serde(default)]
    pub step_ids: Vec<Uuid>,
}

impl WorkflowEntity {
    pub fn new(id: Uuid, step_ids: Vec<Uuid>) -> Self {
        Self {
            id,
            name: String::new(),
            version: "1.0.0".to_string(),
            step_ids,
        }
    }
}
