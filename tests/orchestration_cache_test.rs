//! Orchestration cache behavior across callers and instances

mod common;

use common::{cache_over, fast_cache_config, plugins::standard_factory, FlakyStore, Harness};
use flow_orchestrator::config::CacheConfig;
use flow_orchestrator::constants::keys::RESOLUTION_LEASE_SUFFIX;
use flow_orchestrator::gateway::InMemoryManagerGateway;
use flow_orchestrator::kv::{InMemoryKeyValueStore, KeyValueStore};
use flow_orchestrator::orchestration::{OrchestrationCache, WorkflowGraphResolver};
use flow_orchestrator::state_machine::StepEntryCondition;
use flow_orchestrator::{EventPublisher, OrchestrationError, OrchestrationEvent};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

fn seeded() -> (Arc<InMemoryManagerGateway>, Uuid) {
    let harness = Harness::new(standard_factory());
    let mut flow = harness.flow();
    let last = flow.step("Complete", StepEntryCondition::PreviousCompleted, vec![]);
    flow.step("Complete", StepEntryCondition::Always, vec![last]);
    let flow_id = flow.build();
    (harness.gateway, flow_id)
}

fn lease_key(config: &CacheConfig, flow_id: Uuid) -> String {
    format!("{}:{}:{}", config.key_prefix, flow_id, RESOLUTION_LEASE_SUFFIX)
}

fn cache_with(
    gateway: Arc<InMemoryManagerGateway>,
    store: Arc<dyn KeyValueStore>,
    config: CacheConfig,
) -> OrchestrationCache {
    OrchestrationCache::new(store, Arc::new(WorkflowGraphResolver::new(gateway)), config)
}

#[tokio::test]
async fn test_instances_sharing_a_store_resolve_once() {
    let (gateway, flow_id) = seeded();
    gateway.set_latency(Some(Duration::from_millis(100)));
    let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryKeyValueStore::new());

    let first = cache_over(gateway.clone(), store.clone()).with_instance_id("instance-a");
    let second = cache_over(gateway.clone(), store.clone()).with_instance_id("instance-b");

    let (a, b) = tokio::join!(first.get_or_resolve(flow_id), second.get_or_resolve(flow_id));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(*a, *b);
    assert_eq!(gateway.counters().orchestrated_flow.load(Ordering::SeqCst), 1);
    assert_eq!(first.stats().resolutions + second.stats().resolutions, 1);
    assert!(first.stats().lease_waits + second.stats().lease_waits >= 1);
}

#[tokio::test]
async fn test_explicit_ttl_expires_entry() {
    let (gateway, flow_id) = seeded();
    let cache = cache_over(gateway.clone(), Arc::new(InMemoryKeyValueStore::new()));
    let plan = WorkflowGraphResolver::new(gateway).resolve(flow_id).await.unwrap();

    let stored = cache.store(plan, Some(Duration::from_millis(200))).await.unwrap();
    assert!(stored.expires_at > stored.created_at);
    assert!(cache.get(flow_id).await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(cache.get(flow_id).await.unwrap().is_none());
    assert!(!cache.exists_and_valid(flow_id).await.unwrap());
}

#[tokio::test]
async fn test_expired_plan_is_resolved_again() {
    let (gateway, flow_id) = seeded();
    let cache = cache_over(gateway.clone(), Arc::new(InMemoryKeyValueStore::new()));
    let plan = WorkflowGraphResolver::new(gateway.clone()).resolve(flow_id).await.unwrap();
    cache.store(plan, Some(Duration::from_millis(50))).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    let fresh = cache.get_or_resolve(flow_id).await.unwrap();

    assert!(!fresh.is_expired());
    assert_eq!(cache.stats().resolutions, 1);
    assert_eq!(gateway.counters().orchestrated_flow.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_store_failure_fails_closed() {
    let (gateway, flow_id) = seeded();
    let store = Arc::new(FlakyStore::new());
    let cache = cache_over(gateway.clone(), store.clone());

    store.set_failing(true);
    let err = cache.get_or_resolve(flow_id).await.unwrap_err();

    assert!(matches!(err, OrchestrationError::StoreUnavailable { .. }));
    assert_eq!(gateway.counters().total(), 0);
    assert!(cache.remove(flow_id).await.is_err());

    store.set_failing(false);
    assert!(cache.get_or_resolve(flow_id).await.is_ok());
}

#[tokio::test]
async fn test_remove_invalidates_and_publishes() {
    let (gateway, flow_id) = seeded();
    let events = EventPublisher::new(16);
    let mut receiver = events.subscribe();
    let cache = cache_over(gateway, Arc::new(InMemoryKeyValueStore::new())).with_events(events);

    cache.get_or_resolve(flow_id).await.unwrap();
    cache.remove(flow_id).await.unwrap();
    cache.get_or_resolve(flow_id).await.unwrap();

    let mut kinds = Vec::new();
    while let Ok(published) = receiver.try_recv() {
        kinds.push(published.event);
    }
    assert!(matches!(kinds[0], OrchestrationEvent::PlanResolved { .. }));
    assert!(matches!(kinds[1], OrchestrationEvent::PlanInvalidated { .. }));
    assert!(matches!(kinds[2], OrchestrationEvent::PlanResolved { .. }));
    assert_eq!(cache.stats().resolutions, 2);
}

#[tokio::test]
async fn test_waits_out_an_abandoned_lease() {
    let (gateway, flow_id) = seeded();
    let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryKeyValueStore::new());
    let config = CacheConfig {
        resolution_lease_ms: 400,
        ..fast_cache_config()
    };

    // another instance took the lease and died before releasing it
    store
        .set(&lease_key(&config, flow_id), "crashed-instance", Some(Duration::from_millis(150)))
        .await
        .unwrap();

    let cache = cache_with(gateway, store, config);
    let started = Instant::now();
    let plan = cache.get_or_resolve(flow_id).await.unwrap();

    assert_eq!(plan.orchestrated_flow_id, flow_id);
    assert!(started.elapsed() >= Duration::from_millis(140));
    assert!(cache.stats().lease_waits > 0);
    assert_eq!(cache.stats().resolutions, 1);
}

#[tokio::test]
async fn test_lease_that_never_clears_reports_unavailable() {
    let (gateway, flow_id) = seeded();
    let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryKeyValueStore::new());
    let config = CacheConfig {
        resolution_lease_ms: 100,
        ..fast_cache_config()
    };
    store
        .set(&lease_key(&config, flow_id), "stuck-instance", None)
        .await
        .unwrap();

    let cache = cache_with(gateway.clone(), store, config);
    let err = cache.get_or_resolve(flow_id).await.unwrap_err();

    assert!(matches!(err, OrchestrationError::UpstreamUnavailable { .. }));
    assert_eq!(gateway.counters().orchestrated_flow.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_undecodable_entry_is_a_miss() {
    let (gateway, flow_id) = seeded();
    let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryKeyValueStore::new());
    let config = fast_cache_config();
    store
        .set(&format!("{}:{}", config.key_prefix, flow_id), "{not json", None)
        .await
        .unwrap();

    let cache = cache_with(gateway, store, config);
    assert!(cache.get(flow_id).await.unwrap().is_none());
    assert!(cache.get_or_resolve(flow_id).await.is_ok());
}
