//! Configuration error types

use crate::error::OrchestrationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A source could not be read or deserialized
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    /// A loaded value violates a constraint
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigurationError {
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<ConfigurationError> for OrchestrationError {
    fn from(error: ConfigurationError) -> Self {
        match error {
            ConfigurationError::InvalidValue { field, reason } => {
                OrchestrationError::InvalidConfiguration {
                    context: field,
                    reason,
                }
            }
            other => OrchestrationError::invalid_configuration("configuration", other.to_string()),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
