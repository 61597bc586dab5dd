use crate::state_machine::ActivityExecutionStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Result of one plugin invocation; its status feeds successor routing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedActivityData {
    pub status: ActivityExecutionStatus,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub result_message: Option<String>,
    #[serde(default)]
    pub processor_id: Option<Uuid>,
    #[serde(default)]
    pub execution_id: Option<Uuid>,
    #[serde(default)]
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl ProcessedActivityData {
    pub fn new(status: ActivityExecutionStatus, data: serde_json::Value) -> Self {
        Self {
            status,
            data,
            result_message: None,
            processor_id: None,
            execution_id: None,
            duration_ms: 0,
            completed_at: Utc::now(),
        }
    }

    pub fn completed(data: serde_json::Value) -> Self {
        Self::new(ActivityExecutionStatus::Completed, data)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            result_message: Some(message.into()),
            ..Self::new(ActivityExecutionStatus::Failed, serde_json::Value::Null)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.result_message = Some(message.into());
        self
    }
}
