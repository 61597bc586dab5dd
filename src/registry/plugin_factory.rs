//! # Plugin Factory
//!
//! Plugins are compiled in and registered by a stable
//! `(assembly name, version, type name)` identity. Loading a plugin type means
//! looking its constructor up here; instantiating it means calling that
//! constructor.
//!
//! ```rust
//! use flow_orchestrator::registry::{Plugin, PluginFactory};
//! use flow_orchestrator::correlation::CorrelationContext;
//! use flow_orchestrator::models::ProcessedActivityData;
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Plugin for Echo {
//!     async fn process(
//!         &self,
//!         _context: CorrelationContext,
//!         input: serde_json::Value,
//!     ) -> anyhow::Result<ProcessedActivityData> {
//!         Ok(ProcessedActivityData::completed(input))
//!     }
//! }
//!
//! let factory = PluginFactory::new();
//! factory.register("Demo.Plugins", "1.0.0", "Echo", || Ok(Arc::new(Echo) as Arc<dyn Plugin>));
//! assert_eq!(factory.len(), 1);
//! ```

use crate::correlation::CorrelationContext;
use crate::models::{PluginLoaderConfiguration, ProcessedActivityData};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Processing capability implemented by every plugin
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Process one activity. Errors are reported as a failed step, never
    /// propagated past the executor.
    async fn process(
        &self,
        context: CorrelationContext,
        input: serde_json::Value,
    ) -> anyhow::Result<ProcessedActivityData>;
}

pub type PluginConstructor = Arc<dyn Fn() -> anyhow::Result<Arc<dyn Plugin>> + Send + Sync>;

/// Identity a plugin type is registered under
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PluginTypeKey {
    pub assembly_name: String,
    pub version: String,
    pub type_name: String,
}

impl PluginTypeKey {
    pub fn new(
        assembly_name: impl Into<String>,
        version: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            assembly_name: assembly_name.into(),
            version: version.into(),
            type_name: type_name.into(),
        }
    }

    pub fn from_configuration(config: &PluginLoaderConfiguration) -> Self {
        Self::new(&config.assembly_name, &config.version, &config.type_name)
    }
}

impl fmt::Display for PluginTypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.assembly_name, self.type_name, self.version)
    }
}

/// Explicit constructor registry replacing runtime type resolution
#[derive(Default)]
pub struct PluginFactory {
    constructors: RwLock<HashMap<PluginTypeKey, PluginConstructor>>,
}

impl PluginFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor; returns `true` when it replaced an existing one
    pub fn register<F>(
        &self,
        assembly_name: impl Into<String>,
        version: impl Into<String>,
        type_name: impl Into<String>,
        constructor: F,
    ) -> bool
    where
        F: Fn() -> anyhow::Result<Arc<dyn Plugin>> + Send + Sync + 'static,
    {
        let key = PluginTypeKey::new(assembly_name, version, type_name);
        info!(plugin = %key, "🔌 Registering plugin type");
        self.constructors
            .write()
            .insert(key, Arc::new(constructor))
            .is_some()
    }

    /// Register a plugin type built with `Default`
    pub fn register_default<P>(
        &self,
        assembly_name: impl Into<String>,
        version: impl Into<String>,
        type_name: impl Into<String>,
    ) -> bool
    where
        P: Plugin + Default + 'static,
    {
        self.register(assembly_name, version, type_name, || {
            Ok(Arc::new(P::default()) as Arc<dyn Plugin>)
        })
    }

    pub fn constructor(&self, key: &PluginTypeKey) -> Option<PluginConstructor> {
        self.constructors.read().get(key).cloned()
    }

    pub fn contains(&self, key: &PluginTypeKey) -> bool {
        self.constructors.read().contains_key(key)
    }

    pub fn registered_types(&self) -> Vec<PluginTypeKey> {
        let mut keys: Vec<_> = self.constructors.read().keys().cloned().collect();
        keys.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
        keys
    }

    pub fn len(&self) -> usize {
        self.constructors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for PluginFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginFactory")
            .field("registered_types", &self.registered_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Noop;

    #[async_trait]
    impl Plugin for Noop {
        async fn process(
            &self,
            _context: CorrelationContext,
            _input: serde_json::Value,
        ) -> anyhow::Result<ProcessedActivityData> {
            Ok(ProcessedActivityData::completed(serde_json::Value::Null))
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let factory = PluginFactory::new();
        assert!(!factory.register_default::<Noop>("Asm", "1.0", "Noop"));

        let key = PluginTypeKey::new("Asm", "1.0", "Noop");
        assert!(factory.contains(&key));
        let constructor = factory.constructor(&key).unwrap();
        assert!(constructor().is_ok());
    }

    #[test]
    fn test_versions_are_distinct_types() {
        let factory = PluginFactory::new();
        factory.register_default::<Noop>("Asm", "1.0", "Noop");
        factory.register_default::<Noop>("Asm", "2.0", "Noop");
        assert_eq!(factory.len(), 2);
        assert!(!factory.contains(&PluginTypeKey::new("Asm", "3.0", "Noop")));
    }

    #[test]
    fn test_reregister_replaces() {
        let factory = PluginFactory::new();
        factory.register_default::<Noop>("Asm", "1.0", "Noop");
        assert!(factory.register("Asm", "1.0", "Noop", || anyhow::bail!("broken")));
        let constructor = factory.constructor(&PluginTypeKey::new("Asm", "1.0", "Noop")).unwrap();
        assert!(constructor().is_err());
    }

    #[test]
    fn test_key_from_configuration() {
        let config = PluginLoaderConfiguration::new("Asm", "1.0", "Noop").with_base_path("/opt");
        assert_eq!(
            PluginTypeKey::from_configuration(&config),
            PluginTypeKey::new("Asm", "1.0", "Noop")
        );
    }
}
