//! # Orchestration Data Model
//!
//! Entities served by the external managers (read-only here) and the resolved
//! plan the orchestration cache owns.

pub mod activity;
pub mod assignment;
pub mod orchestrated_flow;
pub mod orchestration_cache;
pub mod plugin;
pub mod step;
pub mod workflow;

pub use activity::ProcessedActivityData;
pub use assignment::AssignmentEntity;
pub use orchestrated_flow::OrchestratedFlowEntity;
pub use orchestration_cache::{OrchestrationCacheModel, StepNavigationData};
pub use plugin::{PluginLoaderConfiguration, StatefulPluginKey, StatefulPluginMetadata};
pub use step::StepEntity;
pub use workflow::WorkflowEntity;
