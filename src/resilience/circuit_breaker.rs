//! # Circuit Breaker
//!
//! Closed (normal), Open (fail fast) and Half-Open (probing recovery) states.
//! The state lives in an atomic so the hot path can check it without locking;
//! counters sit behind a short synchronous lock that is never held across an
//! await point.

use crate::config::CircuitBreakerConfig;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Open,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Call rejected without being attempted
    #[error("Circuit breaker is open for {component}")]
    CircuitOpen { component: String },

    #[error("Operation failed: {0}")]
    OperationFailed(E),
}

/// Point-in-time counters for one breaker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CircuitBreakerMetrics {
    pub total_calls: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub rejected_count: u64,
    pub consecutive_failures: u32,
    pub half_open_successes: u32,
    pub total_duration: Duration,
}

impl CircuitBreakerMetrics {
    pub fn failure_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.failure_count as f64 / self.total_calls as f64
        }
    }

    pub fn average_duration(&self) -> Duration {
        if self.total_calls == 0 {
            Duration::ZERO
        } else {
            let nanos = self.total_duration.as_nanos() / u128::from(self.total_calls);
            Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
        }
    }
}

#[derive(Debug, Default)]
struct BreakerCounters {
    metrics: CircuitBreakerMetrics,
    opened_at: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    state: AtomicU8,
    failure_threshold: u32,
    success_threshold: u32,
    open_timeout: Duration,
    counters: Mutex<BreakerCounters>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(
            component = %name,
            failure_threshold = config.failure_threshold,
            timeout_seconds = config.timeout_seconds,
            success_threshold = config.success_threshold,
            "🛡️ Circuit breaker initialized"
        );

        Self {
            name,
            state: AtomicU8::new(CircuitState::Closed as u8),
            failure_threshold: config.failure_threshold.max(1),
            success_threshold: config.success_threshold.max(1),
            open_timeout: config.timeout(),
            counters: Mutex::new(BreakerCounters::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    pub fn is_healthy(&self) -> bool {
        self.state() == CircuitState::Closed
    }

    /// Execute an operation, counting every error as a failure
    pub async fn call<F, T, E, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_classified(operation, |_| true).await
    }

    /// Execute an operation; only errors matching `is_failure` trip the breaker.
    ///
    /// Errors that prove the downstream is alive (a clean "not found", say)
    /// count as successful round trips.
    pub async fn call_classified<F, T, E, Fut, C>(
        &self,
        operation: F,
        is_failure: C,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: FnOnce(&E) -> bool,
    {
        if !self.admit() {
            self.counters.lock().metrics.rejected_count += 1;
            return Err(CircuitBreakerError::CircuitOpen {
                component: self.name.clone(),
            });
        }

        let started = Instant::now();
        let result = operation().await;
        let elapsed = started.elapsed();

        match &result {
            Err(err) if is_failure(err) => self.record_failure(elapsed),
            _ => self.record_success(elapsed),
        }

        result.map_err(CircuitBreakerError::OperationFailed)
    }

    fn admit(&self) -> bool {
        match self.state() {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let ready = self
                    .counters
                    .lock()
                    .opened_at
                    .map(|opened| opened.elapsed() >= self.open_timeout)
                    .unwrap_or(true);
                if ready {
                    self.transition(CircuitState::HalfOpen);
                }
                ready
            }
        }
    }

    fn record_success(&self, elapsed: Duration) {
        let close = {
            let mut counters = self.counters.lock();
            let metrics = &mut counters.metrics;
            metrics.total_calls += 1;
            metrics.success_count += 1;
            metrics.total_duration += elapsed;
            metrics.consecutive_failures = 0;

            if self.state() == CircuitState::HalfOpen {
                metrics.half_open_successes += 1;
                metrics.half_open_successes >= self.success_threshold
            } else {
                false
            }
        };

        debug!(component = %self.name, duration_ms = elapsed.as_millis() as u64, "🟢 Operation succeeded");
        if close {
            self.transition(CircuitState::Closed);
        }
    }

    fn record_failure(&self, elapsed: Duration) {
        let open = {
            let mut counters = self.counters.lock();
            let metrics = &mut counters.metrics;
            metrics.total_calls += 1;
            metrics.failure_count += 1;
            metrics.total_duration += elapsed;
            metrics.consecutive_failures += 1;

            // a failed trial call reopens immediately
            self.state() == CircuitState::HalfOpen
                || metrics.consecutive_failures >= self.failure_threshold
        };

        warn!(component = %self.name, duration_ms = elapsed.as_millis() as u64, "🔴 Operation failed");
        if open && self.state() != CircuitState::Open {
            self.transition(CircuitState::Open);
        }
    }

    fn transition(&self, next: CircuitState) {
        let previous = CircuitState::from(self.state.swap(next as u8, Ordering::AcqRel));
        if previous == next {
            return;
        }

        {
            let mut counters = self.counters.lock();
            counters.metrics.half_open_successes = 0;
            match next {
                CircuitState::Open => counters.opened_at = Some(Instant::now()),
                CircuitState::Closed => {
                    counters.opened_at = None;
                    counters.metrics.consecutive_failures = 0;
                }
                CircuitState::HalfOpen => {}
            }
        }

        match next {
            CircuitState::Open => warn!(component = %self.name, ?previous, "🚫 Circuit opened"),
            CircuitState::HalfOpen => info!(component = %self.name, "🟡 Circuit half-open, probing"),
            CircuitState::Closed => info!(component = %self.name, ?previous, "✅ Circuit closed"),
        }
    }

    /// Trip the breaker manually
    pub fn force_open(&self) {
        self.transition(CircuitState::Open);
    }

    /// Reset the breaker manually
    pub fn force_closed(&self) {
        self.transition(CircuitState::Closed);
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        self.counters.lock().metrics.clone()
    }
}
