//! # Plugin Registries
//!
//! ```text
//! Registry Infrastructure
//! ├── PluginFactory           (per-process constructor registry, keyed by assembly/version/type)
//! └── StatefulPluginRegistry  (fleet-shared record of instances that must be reused)
//! ```

pub mod plugin_factory;
pub mod stateful_plugin_registry;

pub use plugin_factory::{Plugin, PluginConstructor, PluginFactory, PluginTypeKey};
pub use stateful_plugin_registry::StatefulPluginRegistry;
