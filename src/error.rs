//! Error types for the orchestration core.
//!

use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Orchestration error taxonomy.
///
/// `Clone` so that one coalesced plan resolution can hand the same failure to
/// every waiter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrchestrationError {
    /// The orchestrated flow being resolved does not exist upstream
    #[error("Orchestrated flow {flow_id} not found")]
    FlowNotFound { flow_id: Uuid },

    /// A referenced entity is absent
    #[error("{entity_type} {id} not found")]
    NotFound { entity_type: String, id: Uuid },

    /// A dependency could not be reached; the dependent operation is rejected
    #[error("Upstream unavailable during {operation}: {reason}")]
    UpstreamUnavailable { operation: String, reason: String },

    /// Malformed or missing configuration, rejected before any state change
    #[error("Invalid configuration for {context}: {reason}")]
    InvalidConfiguration { context: String, reason: String },

    /// Cron expression failed validation
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCronExpression { expression: String, reason: String },

    /// Plugin execution exceeded its budget
    #[error("Timeout exceeded for {operation} after {timeout:?}")]
    TimeoutExceeded { operation: String, timeout: Duration },

    /// Plugin raised an error (or panicked) while processing
    #[error("Plugin {plugin} failed: {reason}")]
    PluginError { plugin: String, reason: String },

    /// Plugin type could not be resolved or instantiated
    #[error("Failed to load plugin {plugin}: {reason}")]
    LoadFailure { plugin: String, reason: String },

    /// Shared store (orchestration cache, stateful registry) failed
    #[error("Store {store} unavailable: {reason}")]
    StoreUnavailable { store: String, reason: String },

    /// Cached or published payload could not be (de)serialized
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Scheduler bookkeeping failure
    #[error("Scheduler error for flow {flow_id}: {reason}")]
    SchedulerError { flow_id: Uuid, reason: String },
}

impl OrchestrationError {
    /// Stable code used in events and structured logs
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::FlowNotFound { .. } => "FLOW_NOT_FOUND",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::UpstreamUnavailable { .. } => "UPSTREAM_UNAVAILABLE",
            Self::InvalidConfiguration { .. } => "INVALID_CONFIGURATION",
            Self::InvalidCronExpression { .. } => "INVALID_CRON_EXPRESSION",
            Self::TimeoutExceeded { .. } => "TIMEOUT_EXCEEDED",
            Self::PluginError { .. } => "PLUGIN_ERROR",
            Self::LoadFailure { .. } => "LOAD_FAILURE",
            Self::StoreUnavailable { .. } => "STORE_UNAVAILABLE",
            Self::SerializationError(_) => "SERIALIZATION_ERROR",
            Self::SchedulerError { .. } => "SCHEDULER_ERROR",
        }
    }

    /// Whether a caller could reasonably retry the same operation later.
    ///
    /// Infrastructure failures are transient; validation and reference
    /// failures are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable { .. }
                | Self::StoreUnavailable { .. }
                | Self::TimeoutExceeded { .. }
        )
    }

    pub fn invalid_configuration(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            context: context.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for OrchestrationError {
    fn from(error: serde_json::Error) -> Self {
        OrchestrationError::SerializationError(error.to_string())
    }
}

pub type OrchestrationResult<T> = std::result::Result<T, OrchestrationError>;
