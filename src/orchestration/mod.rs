//! # Orchestration
//!
//! Plan resolution and execution coordination.
//!
//! ```text
//! FlowScheduler ──tick──▶ FlowExecutor ──▶ OrchestrationCache ──miss──▶ WorkflowGraphResolver ──▶ ManagerGateway
//!                              │
//!                              └──per step──▶ PluginExecutor ──▶ StatefulPluginRegistry / PluginFactory
//! ```

pub mod bootstrap;
pub mod flow_executor;
pub mod graph_resolver;
pub mod orchestration_cache;
pub mod plugin_executor;
pub mod scheduler;

pub use bootstrap::{OrchestrationCore, SystemStatus};
pub use flow_executor::{FlowExecutionSummary, FlowExecutor, StepExecutionRecord, StepOutcome};
pub use graph_resolver::WorkflowGraphResolver;
pub use orchestration_cache::{CacheStats, OrchestrationCache};
pub use plugin_executor::{LoadedPluginType, PluginCacheStats, PluginExecutor, PreloadReport};
pub use scheduler::{FlowScheduler, FlowTrigger, RecoveryReport, ScheduleInfo};
