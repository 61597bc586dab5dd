//! # Orchestration Cache
//!
//! Time-bounded cache of resolved plans with single-flight resolution.
//!
//! ## Coalescing
//!
//! Two layers keep a flow from being resolved more than once at a time:
//!
//! - **In-process**: callers for the same flow share one in-flight future.
//!   The future re-reads the store before resolving, so a caller that arrives
//!   just after a flight finished never triggers a second resolution.
//! - **Fleet-wide**: the resolving instance holds a lease key in the shared
//!   store (`compare_and_swap` from absent). Other instances poll the store
//!   until the plan appears or the lease is released.
//!
//! Expiry is passive. `get` never returns a plan at or past its `expires_at`,
//! whether or not the store has physically dropped it.

use super::graph_resolver::WorkflowGraphResolver;
use crate::config::CacheConfig;
use crate::error::{OrchestrationError, OrchestrationResult};
use crate::events::{EventPublisher, OrchestrationEvent};
use crate::kv::KeyValueStore;
use crate::models::OrchestrationCacheModel;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

const STORE_NAME: &str = "orchestration_cache";

type PlanFlight = Shared<BoxFuture<'static, OrchestrationResult<Arc<OrchestrationCacheModel>>>>;

/// Cache counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub resolutions: u64,
    /// Callers that joined a flight another caller started
    pub coalesced: u64,
    /// Polls spent waiting on another instance's lease
    pub lease_waits: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    resolutions: AtomicU64,
    coalesced: AtomicU64,
    lease_waits: AtomicU64,
}

struct CacheInner {
    store: Arc<dyn KeyValueStore>,
    resolver: Arc<WorkflowGraphResolver>,
    config: CacheConfig,
    instance_id: String,
    events: Option<EventPublisher>,
    in_flight: Mutex<HashMap<Uuid, PlanFlight>>,
    counters: Counters,
}

#[derive(Clone)]
pub struct OrchestrationCache {
    inner: Arc<CacheInner>,
}

impl OrchestrationCache {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        resolver: Arc<WorkflowGraphResolver>,
        config: CacheConfig,
    ) -> Self {
        Self::build(store, resolver, config, Uuid::new_v4().to_string(), None)
    }

    fn build(
        store: Arc<dyn KeyValueStore>,
        resolver: Arc<WorkflowGraphResolver>,
        config: CacheConfig,
        instance_id: String,
        events: Option<EventPublisher>,
    ) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                store,
                resolver,
                config,
                instance_id,
                events,
                in_flight: Mutex::new(HashMap::new()),
                counters: Counters::default(),
            }),
        }
    }

    /// Attach an event publisher for plan lifecycle events
    pub fn with_events(self, events: EventPublisher) -> Self {
        self.rebuild(|inner| (inner.instance_id.clone(), Some(events)))
    }

    /// Override the identity written into resolution leases
    pub fn with_instance_id(self, instance_id: impl Into<String>) -> Self {
        let instance_id = instance_id.into();
        self.rebuild(|inner| (instance_id, inner.events.clone()))
    }

    fn rebuild(self, f: impl FnOnce(&CacheInner) -> (String, Option<EventPublisher>)) -> Self {
        let (instance_id, events) = f(&self.inner);
        Self::build(
            self.inner.store.clone(),
            self.inner.resolver.clone(),
            self.inner.config.clone(),
            instance_id,
            events,
        )
    }

    pub fn instance_id(&self) -> &str {
        &self.inner.instance_id
    }

    /// Live, current-version plan for a flow
    pub async fn get(&self, flow_id: Uuid) -> OrchestrationResult<Option<Arc<OrchestrationCacheModel>>> {
        self.inner.get(flow_id).await
    }

    /// Store a plan, overwriting any prior entry; `None` uses the default TTL
    pub async fn store(
        &self,
        plan: OrchestrationCacheModel,
        ttl: Option<Duration>,
    ) -> OrchestrationResult<Arc<OrchestrationCacheModel>> {
        self.inner.store_plan(plan, ttl).await
    }

    /// Idempotent removal
    pub async fn remove(&self, flow_id: Uuid) -> OrchestrationResult<()> {
        let removed = self
            .inner
            .store
            .delete(&self.inner.plan_key(flow_id))
            .await
            .map_err(|e| e.into_orchestration_error(STORE_NAME))?;

        debug!(flow_id = %flow_id, removed, "Removed orchestration plan");
        if removed {
            if let Some(events) = &self.inner.events {
                events.publish(OrchestrationEvent::PlanInvalidated { flow_id });
            }
        }
        Ok(())
    }

    pub async fn exists_and_valid(&self, flow_id: Uuid) -> OrchestrationResult<bool> {
        Ok(self.inner.get(flow_id).await?.is_some())
    }

    /// Serve the cached plan, or resolve it exactly once for all concurrent
    /// callers and cache the result
    #[instrument(skip_all, fields(flow_id = %flow_id))]
    pub async fn get_or_resolve(&self, flow_id: Uuid) -> OrchestrationResult<Arc<OrchestrationCacheModel>> {
        if let Some(plan) = self.inner.get(flow_id).await? {
            return Ok(plan);
        }

        let flight = {
            let mut in_flight = self.inner.in_flight.lock();
            match in_flight.get(&flow_id) {
                Some(flight) => {
                    self.inner.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                    flight.clone()
                }
                None => {
                    let inner = self.inner.clone();
                    let flight = async move {
                        let result = inner.resolve_with_lease(flow_id).await;
                        inner.in_flight.lock().remove(&flow_id);
                        result
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(flow_id, flight.clone());
                    flight
                }
            }
        };

        flight.await
    }

    pub fn stats(&self) -> CacheStats {
        let c = &self.inner.counters;
        CacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            resolutions: c.resolutions.load(Ordering::Relaxed),
            coalesced: c.coalesced.load(Ordering::Relaxed),
            lease_waits: c.lease_waits.load(Ordering::Relaxed),
        }
    }
}

impl CacheInner {
    fn plan_key(&self, flow_id: Uuid) -> String {
        format!("{}:{}", self.config.key_prefix, flow_id)
    }

    fn lease_key(&self, flow_id: Uuid) -> String {
        format!(
            "{}:{}:{}",
            self.config.key_prefix,
            flow_id,
            crate::constants::keys::RESOLUTION_LEASE_SUFFIX
        )
    }

    async fn get(&self, flow_id: Uuid) -> OrchestrationResult<Option<Arc<OrchestrationCacheModel>>> {
        let raw = self
            .store
            .get(&self.plan_key(flow_id))
            .await
            .map_err(|e| e.into_orchestration_error(STORE_NAME))?;

        let plan = raw.and_then(|raw| match serde_json::from_str::<OrchestrationCacheModel>(&raw) {
            Ok(plan) => Some(plan),
            Err(err) => {
                warn!(flow_id = %flow_id, error = %err, "Discarding undecodable cached plan");
                None
            }
        });

        match plan {
            Some(plan) if !plan.is_expired() && plan.is_current_version() => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(Arc::new(plan)))
            }
            _ => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn store_plan(
        &self,
        plan: OrchestrationCacheModel,
        ttl: Option<Duration>,
    ) -> OrchestrationResult<Arc<OrchestrationCacheModel>> {
        let ttl = ttl.unwrap_or_else(|| self.config.default_ttl());
        let plan = plan.with_ttl(ttl);
        let payload = serde_json::to_string(&plan)?;

        self.store
            .set(&self.plan_key(plan.orchestrated_flow_id), &payload, Some(ttl))
            .await
            .map_err(|e| e.into_orchestration_error(STORE_NAME))?;

        debug!(
            flow_id = %plan.orchestrated_flow_id,
            expires_at = %plan.expires_at,
            "Stored orchestration plan"
        );
        Ok(Arc::new(plan))
    }

    /// Resolve under the fleet-wide lease, or wait for whoever holds it
    async fn resolve_with_lease(&self, flow_id: Uuid) -> OrchestrationResult<Arc<OrchestrationCacheModel>> {
        let lease_key = self.lease_key(flow_id);
        let lease_ttl = self.config.resolution_lease();
        let deadline = Instant::now() + lease_ttl * 2;

        loop {
            if let Some(plan) = self.get(flow_id).await? {
                return Ok(plan);
            }

            let acquired = self
                .store
                .compare_and_swap(&lease_key, None, &self.instance_id, Some(lease_ttl))
                .await
                .map_err(|e| e.into_orchestration_error(STORE_NAME))?;

            if acquired {
                let result = self.resolve_and_store(flow_id).await;
                // a lease that outlived its TTL may now belong to another instance
                match self.store.delete_if(&lease_key, &self.instance_id).await {
                    Ok(true) => {}
                    Ok(false) => {
                        debug!(flow_id = %flow_id, "Resolution lease already expired or taken over");
                    }
                    Err(err) => {
                        // the lease TTL reclaims it
                        warn!(flow_id = %flow_id, error = %err, "Failed to release resolution lease");
                    }
                }
                return result;
            }

            if Instant::now() >= deadline {
                return Err(OrchestrationError::UpstreamUnavailable {
                    operation: "resolve_plan".to_string(),
                    reason: format!("timed out waiting on resolution lease for flow {flow_id}"),
                });
            }

            self.counters.lease_waits.fetch_add(1, Ordering::Relaxed);
            tokio::time::sleep(self.config.lease_poll_interval()).await;
        }
    }

    async fn resolve_and_store(&self, flow_id: Uuid) -> OrchestrationResult<Arc<OrchestrationCacheModel>> {
        self.counters.resolutions.fetch_add(1, Ordering::Relaxed);
        let plan = self.resolver.resolve(flow_id).await?;
        let plan = self.store_plan(plan, None).await?;

        info!(
            flow_id = %flow_id,
            expires_at = %plan.expires_at,
            instance_id = %self.instance_id,
            "💾 Cached orchestration plan"
        );
        if let Some(events) = &self.events {
            events.publish(OrchestrationEvent::PlanResolved {
                flow_id,
                step_count: plan.step_entities.len(),
                entry_points: plan.entry_points.clone(),
                expires_at: plan.expires_at,
            });
        }
        Ok(plan)
    }
}
