use crate::constants::system::DEFAULT_EXECUTION_TIMEOUT_MS;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

fn default_execution_timeout_ms() -> u64 {
    DEFAULT_EXECUTION_TIMEOUT_MS
}

fn default_is_stateless() -> bool {
    true
}

/// Plugin loading configuration resolved from workflow data.
///
/// `is_stateless` is only the requested mode. Whether an instance is cached
/// and reused is decided by the stateful plugin registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PluginLoaderConfiguration {
    #[serde(default)]
    pub assembly_base_path: String,
    pub assembly_name: String,
    pub version: String,
    pub type_name: String,
    #[serde(default = "default_execution_timeout_ms")]
    pub execution_timeout_ms: u64,
    #[serde(default = "default_is_stateless")]
    pub is_stateless: bool,
}

impl PluginLoaderConfiguration {
    pub fn new(
        assembly_name: impl Into<String>,
        version: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            assembly_base_path: String::new(),
            assembly_name: assembly_name.into(),
            version: version.into(),
            type_name: type_name.into(),
            execution_timeout_ms: DEFAULT_EXECUTION_TIMEOUT_MS,
            is_stateless: true,
        }
    }

    pub fn with_base_path(mut self, path: impl Into<String>) -> Self {
        self.assembly_base_path = path.into();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.execution_timeout_ms = timeout_ms;
        self
    }

    pub fn with_stateless(mut self, is_stateless: bool) -> Self {
        self.is_stateless = is_stateless;
        self
    }

    /// Human-readable plugin identity used in logs and errors
    pub fn display_name(&self) -> String {
        format!(
            "{}:{}@{}",
            self.assembly_name, self.type_name, self.version
        )
    }
}

/// Composite registry key for a stateful plugin instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatefulPluginKey {
    pub processor_id: Uuid,
    pub assembly_name: String,
    pub version: String,
    pub type_name: String,
}

impl StatefulPluginKey {
    pub fn new(processor_id: Uuid, config: &PluginLoaderConfiguration) -> Self {
        Self {
            processor_id,
            assembly_name: config.assembly_name.clone(),
            version: config.version.clone(),
            type_name: config.type_name.clone(),
        }
    }

    /// Storage key below a registry prefix.
    ///
    /// Components are escaped so `:` only ever appears as the separator and
    /// distinct keys never share a string.
    pub fn key_string(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.processor_id,
            escape_key_component(&self.assembly_name),
            escape_key_component(&self.version),
            escape_key_component(&self.type_name)
        )
    }
}

fn escape_key_component(component: &str) -> String {
    component.replace('%', "%25").replace(':', "%3A")
}

impl fmt::Display for StatefulPluginKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key_string())
    }
}

/// Registry record identifying one stateful plugin instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatefulPluginMetadata {
    pub processor_id: Uuid,
    pub assembly_name: String,
    pub version: String,
    pub type_name: String,
    pub assembly_base_path: String,
    pub registered_at: DateTime<Utc>,
}

impl StatefulPluginMetadata {
    pub fn from_configuration(processor_id: Uuid, config: &PluginLoaderConfiguration) -> Self {
        Self {
            processor_id,
            assembly_name: config.assembly_name.clone(),
            version: config.version.clone(),
            type_name: config.type_name.clone(),
            assembly_base_path: config.assembly_base_path.clone(),
            registered_at: Utc::now(),
        }
    }

    pub fn key(&self) -> StatefulPluginKey {
        StatefulPluginKey {
            processor_id: self.processor_id,
            assembly_name: self.assembly_name.clone(),
            version: self.version.clone(),
            type_name: self.type_name.clone(),
        }
    }

    /// Loader configuration used to rebuild the instance on preload
    pub fn to_configuration(&self, execution_timeout_ms: u64) -> PluginLoaderConfiguration {
        PluginLoaderConfiguration {
            assembly_base_path: self.assembly_base_path.clone(),
            assembly_name: self.assembly_name.clone(),
            version: self.version.clone(),
            type_name: self.type_name.clone(),
            execution_timeout_ms,
            is_stateless: false,
        }
    }
}
