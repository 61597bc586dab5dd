//! # Flow Executor
//!
//! Executes one orchestrated flow end to end:
//!
//! 1. Serve or resolve the plan through the orchestration cache. If that
//!    fails the flow terminates with no step attempted.
//! 2. Start every entry point whose condition permits.
//! 3. Evaluate each other step once all of its in-flow predecessors have
//!    settled, OR-ing its entry condition over the outcomes of the
//!    predecessors that actually executed.
//! 4. Run ready steps concurrently, bounded by `execution.max_concurrent_steps`.
//!
//! A failed or timed-out step is recorded with a `Failed` outcome and routing
//! continues; sibling branches are never aborted.

use super::orchestration_cache::OrchestrationCache;
use super::plugin_executor::PluginExecutor;
use super::scheduler::FlowTrigger;
use crate::config::ExecutionConfig;
use crate::correlation::CorrelationContext;
use crate::error::{OrchestrationError, OrchestrationResult};
use crate::events::{EventPublisher, OrchestrationEvent};
use crate::logging::{log_error, log_flow_operation, log_step_operation};
use crate::models::{AssignmentEntity, OrchestrationCacheModel, ProcessedActivityData};
use crate::state_machine::{
    evaluate_entry_point, evaluate_fan_in, ActivityExecutionStatus, EntryDecision,
};
use crate::validation::validate_activity_payload;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, instrument, Instrument};
use uuid::Uuid;

/// What happened to one step
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Executed {
        status: ActivityExecutionStatus,
        result: Option<ProcessedActivityData>,
        error: Option<OrchestrationError>,
    },
    Skipped {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepExecutionRecord {
    pub step_id: Uuid,
    pub processor_id: Uuid,
    pub outcome: StepOutcome,
    pub duration_ms: u64,
}

impl StepExecutionRecord {
    fn skipped(step_id: Uuid, processor_id: Uuid, reason: impl Into<String>) -> Self {
        Self {
            step_id,
            processor_id,
            outcome: StepOutcome::Skipped {
                reason: reason.into(),
            },
            duration_ms: 0,
        }
    }

    /// Outcome fed to successor routing; `None` when the step was skipped
    pub fn status(&self) -> Option<ActivityExecutionStatus> {
        match &self.outcome {
            StepOutcome::Executed { status, .. } => Some(*status),
            StepOutcome::Skipped { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FlowExecutionSummary {
    pub context: CorrelationContext,
    pub steps: HashMap<Uuid, StepExecutionRecord>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl FlowExecutionSummary {
    pub fn flow_id(&self) -> Uuid {
        self.context.orchestrated_flow_id()
    }

    pub fn status_of(&self, step_id: &Uuid) -> Option<ActivityExecutionStatus> {
        self.steps.get(step_id).and_then(StepExecutionRecord::status)
    }

    pub fn was_skipped(&self, step_id: &Uuid) -> bool {
        matches!(
            self.steps.get(step_id).map(|r| &r.outcome),
            Some(StepOutcome::Skipped { .. })
        )
    }

    pub fn executed_count(&self) -> usize {
        self.steps.values().filter(|r| r.status().is_some()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.steps
            .values()
            .filter(|r| r.status() == Some(ActivityExecutionStatus::Failed))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.steps.values().filter(|r| r.status().is_none()).count()
    }
}

pub struct FlowExecutor {
    cache: OrchestrationCache,
    plugins: Arc<PluginExecutor>,
    events: EventPublisher,
    config: ExecutionConfig,
}

impl FlowExecutor {
    pub fn new(
        cache: OrchestrationCache,
        plugins: Arc<PluginExecutor>,
        events: EventPublisher,
        config: ExecutionConfig,
    ) -> Self {
        Self {
            cache,
            plugins,
            events,
            config,
        }
    }

    pub fn cache(&self) -> &OrchestrationCache {
        &self.cache
    }

    #[instrument(skip_all, fields(flow_id = %flow_id))]
    pub async fn execute_flow(&self, flow_id: Uuid) -> OrchestrationResult<FlowExecutionSummary> {
        let plan = match self.cache.get_or_resolve(flow_id).await {
            Ok(plan) => plan,
            Err(err) => {
                log_error("flow_executor", "resolve_plan", &err.to_string(), Some(&flow_id.to_string()));
                self.events.publish(OrchestrationEvent::FlowFailed {
                    flow_id,
                    error_code: err.error_code().to_string(),
                    reason: err.to_string(),
                });
                return Err(err);
            }
        };

        let context = CorrelationContext::new(flow_id, plan.workflow_id());
        let span = context.span("execute_flow");
        self.run_plan(plan, context).instrument(span).await
    }

    async fn run_plan(
        &self,
        plan: Arc<OrchestrationCacheModel>,
        context: CorrelationContext,
    ) -> OrchestrationResult<FlowExecutionSummary> {
        let started_at = Utc::now();
        let started = Instant::now();
        let flow_id = context.orchestrated_flow_id();

        log_flow_operation("execute", flow_id, Some(context.workflow_id()), "started", None);
        self.events.publish(OrchestrationEvent::FlowStarted {
            context: context.clone(),
            entry_points: plan.entry_points.clone(),
        });

        let mut pending: HashMap<Uuid, usize> = plan
            .step_entities
            .iter()
            .map(|(id, nav)| (*id, nav.previous_step_ids.len()))
            .collect();
        let mut ready: VecDeque<Uuid> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut queued: HashSet<Uuid> = ready.iter().copied().collect();

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_steps.max(1)));
        let mut running: JoinSet<StepExecutionRecord> = JoinSet::new();
        let mut records: HashMap<Uuid, StepExecutionRecord> = HashMap::new();

        loop {
            while let Some(step_id) = ready.pop_front() {
                let Some(nav) = plan.step(&step_id) else {
                    continue;
                };
                let step_context = context.for_step(step_id, nav.step.processor_id);

                match self.entry_decision(&plan, step_id, &records) {
                    Ok(()) => {
                        let task = run_step(
                            self.plugins.clone(),
                            self.events.clone(),
                            semaphore.clone(),
                            step_context,
                            plan.assignments_for(&step_id).to_vec(),
                        );
                        running.spawn(task);
                    }
                    Err(reason) => {
                        debug!(step_id = %step_id, reason = %reason, "Skipping step");
                        self.events.publish(OrchestrationEvent::StepSkipped {
                            context: step_context,
                            reason: reason.clone(),
                        });
                        let record = StepExecutionRecord::skipped(step_id, nav.step.processor_id, reason);
                        settle(&plan, &mut pending, &mut ready, &mut queued, record, &mut records);
                    }
                }
            }

            match running.join_next().await {
                None => break,
                Some(Ok(record)) => settle(&plan, &mut pending, &mut ready, &mut queued, record, &mut records),
                Some(Err(join_error)) => {
                    // the step's successors stay unsettled and are reported below
                    log_error("flow_executor", "step_task", &join_error.to_string(), Some(&flow_id.to_string()));
                }
            }
        }

        for (step_id, nav) in &plan.step_entities {
            records.entry(*step_id).or_insert_with(|| {
                StepExecutionRecord::skipped(
                    *step_id,
                    nav.step.processor_id,
                    "predecessors never settled",
                )
            });
        }

        let summary = FlowExecutionSummary {
            context: context.clone(),
            steps: records,
            started_at,
            completed_at: Utc::now(),
        };

        let details = format!(
            "executed={} failed={} skipped={}",
            summary.executed_count(),
            summary.failed_count(),
            summary.skipped_count()
        );
        log_flow_operation("execute", flow_id, Some(context.workflow_id()), "completed", Some(&details));
        self.events.publish(OrchestrationEvent::FlowCompleted {
            context,
            executed: summary.executed_count(),
            failed: summary.failed_count(),
            skipped: summary.skipped_count(),
            duration_ms: started.elapsed().as_millis() as u64,
        });

        Ok(summary)
    }

    /// `Ok` to run, `Err(reason)` to skip
    fn entry_decision(
        &self,
        plan: &OrchestrationCacheModel,
        step_id: Uuid,
        records: &HashMap<Uuid, StepExecutionRecord>,
    ) -> Result<(), String> {
        let Some(nav) = plan.step(&step_id) else {
            return Err("step missing from plan".to_string());
        };
        let condition = nav.step.entry_condition;

        if nav.is_entry_point() {
            return match evaluate_entry_point(condition) {
                EntryDecision::Run => Ok(()),
                EntryDecision::Skip => Err(format!("entry condition {condition} blocks entry point")),
            };
        }

        let outcomes: Vec<ActivityExecutionStatus> = nav
            .previous_step_ids
            .iter()
            .filter_map(|id| records.get(id).and_then(StepExecutionRecord::status))
            .collect();
        if outcomes.is_empty() {
            return Err("all predecessors were skipped".to_string());
        }

        match evaluate_fan_in(outcomes, condition) {
            EntryDecision::Run => Ok(()),
            EntryDecision::Skip => Err(format!("entry condition {condition} not met by any predecessor")),
        }
    }
}

/// Record a settled step and release successors whose predecessors are all settled
fn settle(
    plan: &OrchestrationCacheModel,
    pending: &mut HashMap<Uuid, usize>,
    ready: &mut VecDeque<Uuid>,
    queued: &mut HashSet<Uuid>,
    record: StepExecutionRecord,
    records: &mut HashMap<Uuid, StepExecutionRecord>,
) {
    let step_id = record.step_id;
    records.insert(step_id, record);

    let Some(nav) = plan.step(&step_id) else {
        return;
    };
    // one decrement per distinct edge; a step is enqueued at most once
    let mut seen = HashSet::new();
    for next in nav.next_step_ids.iter().filter(|id| seen.insert(**id)) {
        if let Some(count) = pending.get_mut(next) {
            *count = count.saturating_sub(1);
            if *count == 0 && !records.contains_key(next) && queued.insert(*next) {
                ready.push_back(*next);
            }
        }
    }
}

/// Plugin input assembled from a step's assignments
fn build_step_input(context: &CorrelationContext, assignments: &[AssignmentEntity]) -> serde_json::Value {
    json!({
        "step_id": context.step_id(),
        "processor_id": context.processor_id(),
        "assignments": assignments
            .iter()
            .map(|a| json!({
                "assignment_id": a.id,
                "entity_ids": a.entity_ids,
                "payload": a.payload,
            }))
            .collect::<Vec<_>>(),
    })
}

async fn run_step(
    plugins: Arc<PluginExecutor>,
    events: EventPublisher,
    semaphore: Arc<Semaphore>,
    context: CorrelationContext,
    assignments: Vec<AssignmentEntity>,
) -> StepExecutionRecord {
    let step_id = context.step_id().unwrap_or_default();
    let processor_id = context.processor_id().unwrap_or_default();
    let _permit = semaphore.acquire_owned().await;
    let started = Instant::now();

    events.publish(OrchestrationEvent::StepStarted {
        context: context.clone(),
    });

    let result = match assignments.iter().find_map(|a| a.plugin.clone()) {
        None => Err(OrchestrationError::invalid_configuration(
            format!("step {step_id}"),
            "no assignment carries a plugin configuration",
        )),
        Some(config) => {
            let input = build_step_input(&context, &assignments);
            match validate_activity_payload(&input) {
                Ok(()) => plugins.execute(&config, &context, input).await,
                Err(err) => Err(err),
            }
        }
    };
    let duration_ms = started.elapsed().as_millis() as u64;

    let outcome = match result {
        Ok(data) => {
            let status = data.status;
            log_step_operation(
                "execute",
                context.orchestrated_flow_id(),
                step_id,
                Some(processor_id),
                &status.to_string(),
                data.result_message.as_deref(),
            );
            let event = if status == ActivityExecutionStatus::Failed {
                OrchestrationEvent::StepFailed {
                    context: context.clone(),
                    error_code: "PLUGIN_REPORTED_FAILURE".to_string(),
                    reason: data.result_message.clone().unwrap_or_default(),
                }
            } else {
                OrchestrationEvent::StepCompleted {
                    context: context.clone(),
                    status,
                    duration_ms,
                }
            };
            events.publish(event);
            StepOutcome::Executed {
                status,
                result: Some(data),
                error: None,
            }
        }
        Err(err) => {
            log_step_operation(
                "execute",
                context.orchestrated_flow_id(),
                step_id,
                Some(processor_id),
                "failed",
                Some(&err.to_string()),
            );
            events.publish(OrchestrationEvent::StepFailed {
                context: context.clone(),
                error_code: err.error_code().to_string(),
                reason: err.to_string(),
            });
            StepOutcome::Executed {
                status: ActivityExecutionStatus::Failed,
                result: None,
                error: Some(err),
            }
        }
    };

    StepExecutionRecord {
        step_id,
        processor_id,
        outcome,
        duration_ms,
    }
}

#[async_trait]
impl FlowTrigger for FlowExecutor {
    async fn trigger(&self, flow_id: Uuid) -> OrchestrationResult<()> {
        self.execute_flow(flow_id).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrchestratedFlowEntity, StepEntity, StepNavigationData};

    fn record(step_id: Uuid, status: Option<ActivityExecutionStatus>) -> StepExecutionRecord {
        match status {
            Some(status) => StepExecutionRecord {
                step_id,
                processor_id: Uuid::nil(),
                outcome: StepOutcome::Executed {
                    status,
                    result: None,
                    error: None,
                },
                duration_ms: 0,
            },
            None => StepExecutionRecord::skipped(step_id, Uuid::nil(), "test"),
        }
    }

    fn chain_plan() -> (OrchestrationCacheModel, Uuid, Uuid) {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut steps = HashMap::new();
        steps.insert(
            a,
            StepNavigationData {
                step: StepEntity::new(a, Uuid::new_v4()).with_next_steps(vec![b]),
                previous_step_ids: vec![],
                next_step_ids: vec![b],
            },
        );
        steps.insert(
            b,
            StepNavigationData {
                step: StepEntity::new(b, Uuid::new_v4()),
                previous_step_ids: vec![a],
                next_step_ids: vec![],
            },
        );
        let flow = OrchestratedFlowEntity::new(Uuid::new_v4(), Uuid::new_v4());
        (
            OrchestrationCacheModel::new(flow, steps, vec![], HashMap::new(), vec![a]),
            a,
            b,
        )
    }

    #[test]
    fn test_settle_releases_successor() {
        let (plan, a, b) = chain_plan();
        let mut pending: HashMap<Uuid, usize> = [(a, 0), (b, 1)].into_iter().collect();
        let mut ready = VecDeque::new();
        let mut queued = HashSet::new();
        let mut records = HashMap::new();

        settle(
            &plan,
            &mut pending,
            &mut ready,
            &mut queued,
            record(a, Some(ActivityExecutionStatus::Completed)),
            &mut records,
        );
        assert_eq!(ready, VecDeque::from(vec![b]));
        assert_eq!(pending[&b], 0);
    }

    #[test]
    fn test_settle_counts_repeated_edge_once() {
        let (mut plan, a, b) = chain_plan();
        let other = Uuid::new_v4();
        if let Some(nav) = plan.step_entities.get_mut(&a) {
            nav.next_step_ids = vec![b, b];
        }
        plan.step_entities.insert(
            other,
            StepNavigationData {
                step: StepEntity::new(other, Uuid::new_v4()).with_next_steps(vec![b]),
                previous_step_ids: vec![],
                next_step_ids: vec![b],
            },
        );
        let mut pending: HashMap<Uuid, usize> = [(a, 0), (other, 0), (b, 2)].into_iter().collect();
        let mut ready = VecDeque::new();
        let mut queued = HashSet::new();
        let mut records = HashMap::new();

        settle(
            &plan,
            &mut pending,
            &mut ready,
            &mut queued,
            record(a, Some(ActivityExecutionStatus::Completed)),
            &mut records,
        );
        assert!(ready.is_empty());
        assert_eq!(pending[&b], 1);

        settle(
            &plan,
            &mut pending,
            &mut ready,
            &mut queued,
            record(other, Some(ActivityExecutionStatus::Completed)),
            &mut records,
        );
        assert_eq!(ready, VecDeque::from(vec![b]));
    }

    #[test]
    fn test_summary_counts() {
        let context = CorrelationContext::new(Uuid::new_v4(), Uuid::new_v4());
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let steps = [
            record(a, Some(ActivityExecutionStatus::Completed)),
            record(b, Some(ActivityExecutionStatus::Failed)),
            record(c, None),
        ]
        .into_iter()
        .map(|r| (r.step_id, r))
        .collect();
        let summary = FlowExecutionSummary {
            context,
            steps,
            started_at: Utc::now(),
            completed_at: Utc::now(),
        };
        assert_eq!(summary.executed_count(), 2);
        assert_eq!(summary.failed_count(), 1);
        assert_eq!(summary.skipped_count(), 1);
        assert!(summary.was_skipped(&c));
        assert_eq!(summary.status_of(&a), Some(ActivityExecutionStatus::Completed));
    }

    #[test]
    fn test_step_input_lists_assignments() {
        let context = CorrelationContext::new(Uuid::new_v4(), Uuid::new_v4()).for_step(Uuid::new_v4(), Uuid::new_v4());
        let assignment = AssignmentEntity::new(Uuid::new_v4(), context.step_id().unwrap())
            .with_payload(json!({"k": "v"}));
        let input = build_step_input(&context, &[assignment]);
        assert_eq!(input["assignments"][0]["payload"]["k"], "v");
    }
}
