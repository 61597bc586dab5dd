//! Cron scheduling against recorded and real triggers

mod common;

use common::plugins::standard_factory;
use common::{Harness, RecordingTrigger};
use flow_orchestrator::config::SchedulerConfig;
use flow_orchestrator::gateway::{InMemoryManagerGateway, ManagerGateway};
use flow_orchestrator::models::OrchestratedFlowEntity;
use flow_orchestrator::orchestration::FlowScheduler;
use flow_orchestrator::state_machine::{ScheduleState, StepEntryCondition};
use flow_orchestrator::{OrchestrationError, OrchestrationEvent};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const EVERY_SECOND: &str = "* * * * * *";

fn scheduler_with(
    gateway: Arc<InMemoryManagerGateway>,
) -> (FlowScheduler, Arc<RecordingTrigger>) {
    let trigger = Arc::new(RecordingTrigger::default());
    let scheduler = FlowScheduler::new(trigger.clone(), gateway, SchedulerConfig::default());
    (scheduler, trigger)
}

#[tokio::test]
async fn test_one_time_job_fires_once_and_leaves_flow_untouched() {
    let gateway = Arc::new(InMemoryManagerGateway::new());
    let flow = OrchestratedFlowEntity::new(Uuid::new_v4(), Uuid::new_v4()).with_schedule(EVERY_SECOND, true);
    let flow_id = flow.id;
    gateway.insert_flow(flow.clone());

    let (scheduler, trigger) = scheduler_with(gateway.clone());
    scheduler.apply_flow(&flow).await.unwrap();
    assert_eq!(scheduler.state(flow_id), ScheduleState::Scheduled);

    tokio::time::sleep(Duration::from_millis(2500)).await;

    assert_eq!(trigger.count_for(flow_id), 1);
    assert_eq!(scheduler.state(flow_id), ScheduleState::Stopped);
    assert!(scheduler.info(flow_id).is_none());

    let stored = gateway.get_orchestrated_flow(flow_id).await.unwrap();
    assert_eq!(stored, flow);
    assert!(stored.is_schedule_enabled);
}

#[tokio::test]
async fn test_stop_prevents_future_ticks() {
    let gateway = Arc::new(InMemoryManagerGateway::new());
    let (scheduler, trigger) = scheduler_with(gateway);
    let flow_id = Uuid::new_v4();

    scheduler.start(flow_id, EVERY_SECOND, false).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert!(scheduler.stop(flow_id).await);
    let fired = trigger.count_for(flow_id);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(trigger.count_for(flow_id), fired);
    assert!(!scheduler.stop(flow_id).await);
}

#[tokio::test]
async fn test_recover_restores_enabled_schedules() {
    let gateway = Arc::new(InMemoryManagerGateway::new());
    let hourly = OrchestratedFlowEntity::new(Uuid::new_v4(), Uuid::new_v4()).with_schedule("0 0 * * * *", false);
    let nightly = OrchestratedFlowEntity::new(Uuid::new_v4(), Uuid::new_v4()).with_schedule("0 30 2 * * *", true);
    let broken = OrchestratedFlowEntity::new(Uuid::new_v4(), Uuid::new_v4()).with_schedule("every tuesday", false);
    let manual = OrchestratedFlowEntity::new(Uuid::new_v4(), Uuid::new_v4());
    for flow in [&hourly, &nightly, &broken, &manual] {
        gateway.insert_flow(flow.clone());
    }

    let (scheduler, _trigger) = scheduler_with(gateway);
    let report = scheduler.recover().await.unwrap();

    let mut restored = report.restored.clone();
    restored.sort();
    let mut expected = vec![hourly.id, nightly.id];
    expected.sort();
    assert_eq!(restored, expected);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, broken.id);

    assert_eq!(scheduler.scheduled_flows().len(), 2);
    assert_eq!(scheduler.state(manual.id), ScheduleState::Stopped);
    assert!(scheduler.info(nightly.id).unwrap().one_time);
}

#[tokio::test]
async fn test_recover_propagates_unavailable_manager() {
    let gateway = Arc::new(InMemoryManagerGateway::new());
    gateway.set_available(false);
    let (scheduler, _trigger) = scheduler_with(gateway);

    let err = scheduler.recover().await.unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_invalid_cron_leaves_existing_job_in_place() {
    let gateway = Arc::new(InMemoryManagerGateway::new());
    let (scheduler, _trigger) = scheduler_with(gateway);
    let flow_id = Uuid::new_v4();

    scheduler.start(flow_id, "0 0 * * * *", false).await.unwrap();
    let err = scheduler.start(flow_id, "0 0 * * *", false).await.unwrap_err();

    assert!(matches!(err, OrchestrationError::InvalidCronExpression { .. }));
    assert_eq!(scheduler.info(flow_id).unwrap().cron_expression, "0 0 * * * *");
}

#[tokio::test]
async fn test_disabling_schedule_stops_job() {
    let gateway = Arc::new(InMemoryManagerGateway::new());
    let (scheduler, _trigger) = scheduler_with(gateway);
    let mut flow = OrchestratedFlowEntity::new(Uuid::new_v4(), Uuid::new_v4()).with_schedule("0 0 * * * *", false);

    scheduler.apply_flow(&flow).await.unwrap();
    assert!(scheduler.state(flow.id).is_active());

    flow.is_schedule_enabled = false;
    scheduler.apply_flow(&flow).await.unwrap();
    assert_eq!(scheduler.state(flow.id), ScheduleState::Stopped);
}

#[tokio::test]
async fn test_scheduled_tick_executes_flow() {
    let harness = Harness::new(standard_factory());
    let mut flow = harness.flow();
    flow.step("Complete", StepEntryCondition::Always, vec![]);
    let flow_id = flow.build();

    let mut receiver = harness.events.subscribe();
    let scheduler = FlowScheduler::new(
        harness.executor.clone(),
        harness.gateway.clone(),
        SchedulerConfig::default(),
    )
    .with_events(harness.events.clone());
    scheduler.start(flow_id, EVERY_SECOND, true).await.unwrap();

    let completed = tokio::time::timeout(Duration::from_secs(4), async {
        loop {
            match receiver.recv().await {
                Ok(published) => {
                    if let OrchestrationEvent::FlowCompleted { context, executed, .. } = published.event {
                        break (context.orchestrated_flow_id(), executed);
                    }
                }
                Err(err) => panic!("event stream closed: {err}"),
            }
        }
    })
    .await
    .expect("flow never completed");

    assert_eq!(completed, (flow_id, 1));
}

#[tokio::test]
async fn test_enabled_schedule_without_expression_is_rejected() {
    let gateway = Arc::new(InMemoryManagerGateway::new());
    let (scheduler, _trigger) = scheduler_with(gateway);
    let mut flow = OrchestratedFlowEntity::new(Uuid::new_v4(), Uuid::new_v4()).with_schedule("0 0 * * * *", false);
    scheduler.apply_flow(&flow).await.unwrap();

    flow.cron_expression = None;
    let err = scheduler.apply_flow(&flow).await.unwrap_err();

    assert!(matches!(err, OrchestrationError::InvalidConfiguration { .. }));
    assert_eq!(scheduler.info(flow.id).unwrap().cron_expression, "0 0 * * * *");
}
