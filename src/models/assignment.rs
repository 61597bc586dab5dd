use super::plugin::PluginLoaderConfiguration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-step configuration attached to an orchestrated flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentEntity {
    pub id: Uuid,
    /// Step this assignment configures
    pub step_id: Uuid,
    /// Entities (addresses, schemas, deliveries) the step operates on
    #[serde(default)]
    pub entity_ids: Vec<Uuid>,
    /// Plugin the step's processor loads, when the assignment carries one
    #[serde(default)]
    pub plugin: Option<PluginLoaderConfiguration>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl AssignmentEntity {
    pub fn new(id: Uuid, step_id: Uuid) -> Self {
        Self {
            id,
            step_id,
            entity_ids: Vec::new(),
            plugin: None,
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_plugin(mut self, plugin: PluginLoaderConfiguration) -> Self {
        self.plugin = Some(plugin);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}
