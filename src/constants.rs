//! # System Constants
//!
//! Event names, store key prefixes and operational defaults shared across the
//! orchestration core.

/// Event names published on the event bus
pub mod events {
    // Flow lifecycle events
    pub const FLOW_STARTED: &str = "flow.started";
    pub const FLOW_COMPLETED: &str = "flow.completed";
    pub const FLOW_FAILED: &str = "flow.failed";

    // Step lifecycle events
    pub const STEP_STARTED: &str = "step.started";
    pub const STEP_COMPLETED: &str = "step.completed";
    pub const STEP_FAILED: &str = "step.failed";
    pub const STEP_SKIPPED: &str = "step.skipped";

    // Plan cache events
    pub const PLAN_RESOLVED: &str = "plan.resolved";
    pub const PLAN_INVALIDATED: &str = "plan.invalidated";

    // Scheduler events
    pub const SCHEDULE_STARTED: &str = "schedule.started";
    pub const SCHEDULE_STOPPED: &str = "schedule.stopped";
    pub const SCHEDULE_FIRED: &str = "schedule.fired";

    // Stateful plugin registry events
    pub const PLUGIN_REGISTERED: &str = "plugin.stateful_registered";
    pub const PLUGIN_UNREGISTERED: &str = "plugin.stateful_unregistered";
}

/// System-wide defaults
pub mod system {
    /// Schema-compatibility tag written into every cached plan
    pub const ORCHESTRATION_CACHE_VERSION: &str = "1.0";

    /// Default plan time-to-live in seconds
    pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 3600;

    /// Default lease held by the instance resolving a plan
    pub const DEFAULT_RESOLUTION_LEASE_MS: u64 = 30_000;

    /// Default interval at which non-leaseholders poll for a resolved plan
    pub const DEFAULT_LEASE_POLL_INTERVAL_MS: u64 = 50;

    /// Default plugin execution budget
    pub const DEFAULT_EXECUTION_TIMEOUT_MS: u64 = 300_000;

    /// Upper bound applied to any configured plugin budget
    pub const MAX_EXECUTION_TIMEOUT_MS: u64 = 3_600_000;

    /// Default concurrent steps within one flow execution
    pub const DEFAULT_MAX_CONCURRENT_STEPS: usize = 16;

    /// Default broadcast channel capacity for the event publisher
    pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1000;

    /// Number of whitespace-separated fields a cron expression must carry
    pub const CRON_FIELD_COUNT: usize = 6;
}

/// Key prefixes used in the shared key-value store
pub mod keys {
    pub const ORCHESTRATION_CACHE_PREFIX: &str = "orchestration-cache";
    pub const RESOLUTION_LEASE_SUFFIX: &str = "resolving";
    pub const STATEFUL_PLUGIN_PREFIX: &str = "stateful-plugins";
}
