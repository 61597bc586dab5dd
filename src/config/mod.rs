//! # Orchestrator Configuration
//!
//! Typed configuration for every component of the orchestration core, layered
//! from built-in defaults, an optional file and prefixed environment variables.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use flow_orchestrator::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load(None)?;
//! let ttl = manager.config().cache.default_ttl();
//! let timeout = manager.config().plugins.default_execution_timeout();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::{keys, system};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::{detect_environment, ConfigManager};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Orchestration plan cache settings
    pub cache: CacheConfig,

    /// Plugin loading and execution settings
    pub plugins: PluginConfig,

    /// Cron scheduler settings
    pub scheduler: SchedulerConfig,

    /// Flow execution settings
    pub execution: ExecutionConfig,

    /// Event publisher settings
    pub events: EventsConfig,

    /// Circuit breaker protecting the manager gateway
    pub circuit_breaker: CircuitBreakerConfig,
}

impl OrchestratorConfig {
    /// Reject values that would make a component misbehave silently
    pub fn validate(&self) -> ConfigResult<()> {
        if self.cache.default_ttl_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "cache.default_ttl_seconds",
                "must be greater than zero",
            ));
        }
        if self.cache.resolution_lease_ms == 0 || self.cache.lease_poll_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "cache.resolution_lease_ms",
                "lease and poll interval must be greater than zero",
            ));
        }
        if self.cache.lease_poll_interval_ms > self.cache.resolution_lease_ms {
            return Err(ConfigurationError::invalid_value(
                "cache.lease_poll_interval_ms",
                "must not exceed the resolution lease",
            ));
        }
        if self.plugins.default_execution_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "plugins.default_execution_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.plugins.max_execution_timeout_ms < self.plugins.default_execution_timeout_ms {
            return Err(ConfigurationError::invalid_value(
                "plugins.max_execution_timeout_ms",
                "must be at least the default execution timeout",
            ));
        }
        if self.execution.max_concurrent_steps == 0 {
            return Err(ConfigurationError::invalid_value(
                "execution.max_concurrent_steps",
                "must be greater than zero",
            ));
        }
        if self.events.channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "events.channel_capacity",
                "must be greater than zero",
            ));
        }
        if self.circuit_breaker.failure_threshold == 0 || self.circuit_breaker.success_threshold == 0
        {
            return Err(ConfigurationError::invalid_value(
                "circuit_breaker",
                "thresholds must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Orchestration plan cache configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Plan validity window
    pub default_ttl_seconds: u64,
    /// How long one instance may hold the right to resolve a flow
    pub resolution_lease_ms: u64,
    /// How often other instances check for the leaseholder's result
    pub lease_poll_interval_ms: u64,
    pub key_prefix: String,
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }

    pub fn resolution_lease(&self) -> Duration {
        Duration::from_millis(self.resolution_lease_ms)
    }

    pub fn lease_poll_interval(&self) -> Duration {
        Duration::from_millis(self.lease_poll_interval_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: system::DEFAULT_CACHE_TTL_SECONDS,
            resolution_lease_ms: system::DEFAULT_RESOLUTION_LEASE_MS,
            lease_poll_interval_ms: system::DEFAULT_LEASE_POLL_INTERVAL_MS,
            key_prefix: keys::ORCHESTRATION_CACHE_PREFIX.to_string(),
        }
    }
}

/// Plugin loading and execution configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Budget used when an assignment carries a zero timeout
    pub default_execution_timeout_ms: u64,
    /// Ceiling applied to every configured budget
    pub max_execution_timeout_ms: u64,
    /// Base path used when an assignment leaves it empty
    pub default_assembly_base_path: String,
    pub registry_key_prefix: String,
}

impl PluginConfig {
    pub fn default_execution_timeout(&self) -> Duration {
        Duration::from_millis(self.default_execution_timeout_ms)
    }

    /// Effective budget for a configured timeout
    pub fn effective_timeout(&self, configured_ms: u64) -> Duration {
        let ms = if configured_ms == 0 {
            self.default_execution_timeout_ms
        } else {
            configured_ms.min(self.max_execution_timeout_ms)
        };
        Duration::from_millis(ms)
    }
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            default_execution_timeout_ms: system::DEFAULT_EXECUTION_TIMEOUT_MS,
            max_execution_timeout_ms: system::MAX_EXECUTION_TIMEOUT_MS,
            default_assembly_base_path: "plugins".to_string(),
            registry_key_prefix: keys::STATEFUL_PLUGIN_PREFIX.to_string(),
        }
    }
}

/// Cron scheduler configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Reload enabled schedules from the flow manager on startup
    pub recover_on_startup: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            recover_on_startup: true,
        }
    }
}

/// Flow execution configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Concurrent steps within one flow execution
    pub max_concurrent_steps: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_steps: system::DEFAULT_MAX_CONCURRENT_STEPS,
        }
    }
}

/// Event publisher configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: system::DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

/// Circuit breaker configuration for the manager gateway
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub enabled: bool,
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// How long the circuit stays open before probing
    pub timeout_seconds: u64,
    /// Successful half-open trial calls needed to close again
    pub success_threshold: u32,
}

impl CircuitBreakerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            timeout_seconds: 30,
            success_threshold: 2,
        }
    }
}
