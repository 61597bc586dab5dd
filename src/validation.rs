//! Input and reference validation for the orchestration core
//!
//! Pure checks reject malformed entities, cron expressions, plugin
//! configurations and activity payloads before any state changes.
//! [`ReferenceValidator`] checks cross-entity references through the manager
//! gateway and fails closed when the gateway is unreachable.

use crate::constants::system::CRON_FIELD_COUNT;
use crate::error::{OrchestrationError, OrchestrationResult};
use crate::gateway::ManagerGateway;
use crate::models::{OrchestratedFlowEntity, PluginLoaderConfiguration, StepEntity};
use cron::Schedule;
use serde_json::Value;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Maximum serialized size of an activity payload (1MB)
const MAX_PAYLOAD_SIZE_BYTES: usize = 1024 * 1024;

/// Maximum nesting depth for activity payloads
const MAX_PAYLOAD_DEPTH: usize = 32;

/// Parse a six-field cron expression (`sec min hour day-of-month month day-of-week`)
pub fn validate_cron_expression(expression: &str) -> OrchestrationResult<Schedule> {
    let invalid = |reason: String| OrchestrationError::InvalidCronExpression {
        expression: expression.to_string(),
        reason,
    };

    let fields = expression.split_whitespace().count();
    if fields != CRON_FIELD_COUNT {
        return Err(invalid(format!(
            "expected {CRON_FIELD_COUNT} fields, found {fields}"
        )));
    }

    Schedule::from_str(expression.trim()).map_err(|e| invalid(e.to_string()))
}

pub fn validate_step_entity(step: &StepEntity) -> OrchestrationResult<()> {
    let context = format!("step {}", step.id);
    if step.id.is_nil() {
        return Err(OrchestrationError::invalid_configuration(context, "step id is empty"));
    }
    if step.processor_id.is_nil() {
        return Err(OrchestrationError::invalid_configuration(context, "processor id is empty"));
    }
    if step.next_step_ids.contains(&step.id) {
        return Err(OrchestrationError::invalid_configuration(context, "step lists itself as a successor"));
    }
    let mut seen = HashSet::new();
    if let Some(duplicate) = step.next_step_ids.iter().find(|id| !seen.insert(**id)) {
        return Err(OrchestrationError::invalid_configuration(
            context,
            format!("successor {duplicate} listed more than once"),
        ));
    }
    Ok(())
}

pub fn validate_orchestrated_flow(flow: &OrchestratedFlowEntity) -> OrchestrationResult<()> {
    let context = format!("orchestrated flow {}", flow.id);
    if flow.workflow_id.is_nil() {
        return Err(OrchestrationError::invalid_configuration(context, "workflow id is empty"));
    }
    let mut seen = HashSet::new();
    if let Some(duplicate) = flow.assignment_ids.iter().find(|id| !seen.insert(**id)) {
        return Err(OrchestrationError::invalid_configuration(
            context,
            format!("assignment {duplicate} listed more than once"),
        ));
    }
    if flow.is_schedule_enabled {
        match flow.cron_expression.as_deref() {
            Some(expression) => {
                validate_cron_expression(expression)?;
            }
            None => {
                return Err(OrchestrationError::invalid_configuration(
                    context,
                    "schedule enabled without a cron expression",
                ))
            }
        }
    }
    Ok(())
}

pub fn validate_plugin_configuration(config: &PluginLoaderConfiguration) -> OrchestrationResult<()> {
    let context = format!("plugin {}", config.display_name());
    for (field, value) in [
        ("assembly_name", &config.assembly_name),
        ("version", &config.version),
        ("type_name", &config.type_name),
    ] {
        if value.trim().is_empty() {
            return Err(OrchestrationError::invalid_configuration(
                context,
                format!("{field} is empty"),
            ));
        }
    }
    Ok(())
}

/// Size and depth limits for the input handed to a plugin
pub fn validate_activity_payload(payload: &Value) -> OrchestrationResult<()> {
    let size = serde_json::to_vec(payload)?.len();
    if size > MAX_PAYLOAD_SIZE_BYTES {
        return Err(OrchestrationError::invalid_configuration(
            "activity payload",
            format!("{size} bytes exceeds {MAX_PAYLOAD_SIZE_BYTES}"),
        ));
    }
    let depth = payload_depth(payload);
    if depth > MAX_PAYLOAD_DEPTH {
        return Err(OrchestrationError::invalid_configuration(
            "activity payload",
            format!("nesting depth {depth} exceeds {MAX_PAYLOAD_DEPTH}"),
        ));
    }
    Ok(())
}

fn payload_depth(value: &Value) -> usize {
    match value {
        Value::Object(map) => 1 + map.values().map(payload_depth).max().unwrap_or(0),
        Value::Array(items) => 1 + items.iter().map(payload_depth).max().unwrap_or(0),
        _ => 0,
    }
}

/// Cross-entity reference checks through the manager gateway
pub struct ReferenceValidator {
    gateway: Arc<dyn ManagerGateway>,
}

impl ReferenceValidator {
    pub fn new(gateway: Arc<dyn ManagerGateway>) -> Self {
        Self { gateway }
    }

    /// Every successor a step names must exist
    pub async fn validate_step_references(&self, step: &StepEntity) -> OrchestrationResult<()> {
        validate_step_entity(step)?;
        for next in &step.next_step_ids {
            if !self.gateway.check_step_exists(*next).await? {
                return Err(OrchestrationError::NotFound {
                    entity_type: "step".to_string(),
                    id: *next,
                });
            }
        }
        Ok(())
    }

    pub async fn validate_schema_reference(&self, schema_id: Uuid) -> OrchestrationResult<()> {
        if schema_id.is_nil() {
            return Err(OrchestrationError::invalid_configuration("schema reference", "schema id is empty"));
        }
        if !self.gateway.check_schema_exists(schema_id).await? {
            return Err(OrchestrationError::NotFound {
                entity_type: "schema".to_string(),
                id: schema_id,
            });
        }
        Ok(())
    }

    /// A step still referenced by a workflow cannot be deleted
    pub async fn ensure_step_deletable(&self, step_id: Uuid) -> OrchestrationResult<()> {
        if self.gateway.check_workflow_references(step_id).await? {
            return Err(OrchestrationError::invalid_configuration(
                format!("step {step_id}"),
                "step is referenced by a workflow",
            ));
        }
        Ok(())
    }
}
