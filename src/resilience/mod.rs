//! # Resilience
//!
//! Fault isolation for calls to the flow manager. A tripped circuit makes
//! gateway calls fail fast with an upstream-unavailable error instead of
//! piling requests onto an unhealthy service.

pub mod circuit_breaker;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerError, CircuitBreakerMetrics, CircuitState};
