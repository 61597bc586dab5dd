#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Flow Orchestrator Core
//!
//! Orchestration-resolution and execution-coordination engine for
//! plugin-driven workflow processing.
//!
//! ## Overview
//!
//! Workflows are directed graphs of steps, each bound to a processor that runs
//! a plugin. This crate resolves an orchestrated flow into an executable plan,
//! caches that plan with bounded validity, decides at every step boundary
//! whether a successor runs, tracks which plugin instances must keep state
//! across invocations, and runs plugins under an execution budget. Flows run
//! on demand or on a cron schedule.
//!
//! ## Module Organization
//!
//! - [`orchestration`] - Graph resolver, plan cache, flow executor, plugin executor, scheduler
//! - [`state_machine`] - Execution outcomes, entry conditions and the entry-condition engine
//! - [`registry`] - Plugin factory and the distributed stateful plugin registry
//! - [`gateway`] - Manager gateway boundary (plus embedded and circuit-broken variants)
//! - [`kv`] - Shared key-value store abstraction
//! - [`models`] - Flow, workflow, step, assignment, plugin and plan types
//! - [`correlation`] - Correlation context threaded through every call
//! - [`events`] - Typed lifecycle events and the broadcast publisher
//! - [`resilience`] - Circuit breaker
//! - [`validation`] - Entity, cron, plugin and reference validation
//! - [`config`] - Layered configuration
//! - [`logging`] - Structured logging setup and helpers
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flow_orchestrator::config::ConfigManager;
//! use flow_orchestrator::gateway::InMemoryManagerGateway;
//! use flow_orchestrator::kv::InMemoryKeyValueStore;
//! use flow_orchestrator::orchestration::OrchestrationCore;
//! use flow_orchestrator::registry::PluginFactory;
//! use std::sync::Arc;
//! use uuid::Uuid;
//!
//! # async fn example(flow_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
//! flow_orchestrator::logging::init_structured_logging();
//!
//! let core = OrchestrationCore::bootstrap(
//!     ConfigManager::load(None)?,
//!     Arc::new(InMemoryManagerGateway::new()),
//!     Arc::new(InMemoryKeyValueStore::new()),
//!     Arc::new(PluginFactory::new()),
//! )?;
//! core.start().await?;
//!
//! let summary = core.flow_executor().execute_flow(flow_id).await?;
//! println!("{} steps executed", summary.executed_count());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod correlation;
pub mod error;
pub mod events;
pub mod gateway;
pub mod kv;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod registry;
pub mod resilience;
pub mod state_machine;
pub mod validation;

pub use config::{ConfigManager, OrchestratorConfig};
pub use correlation::CorrelationContext;
pub use error::{OrchestrationError, OrchestrationResult};
pub use events::{EventPublisher, OrchestrationEvent};
pub use gateway::{GatewayError, ManagerGateway};
pub use kv::KeyValueStore;
pub use orchestration::{
    FlowExecutionSummary, FlowExecutor, FlowScheduler, OrchestrationCache, OrchestrationCore,
    PluginExecutor, WorkflowGraphResolver,
};
pub use registry::{Plugin, PluginFactory, StatefulPluginRegistry};
pub use state_machine::{ActivityExecutionStatus, ScheduleState, StepEntryCondition};
