//! # Workflow Graph Resolver
//!
//! Turns an orchestrated flow into an executable plan: the closed step graph,
//! predecessor links, entry points, per-step assignments and the processors
//! involved.
//!
//! The step set is seeded from the workflow's own step list and the steps
//! named by the flow's assignments, then closed over `next_step_ids`. Entry
//! points are the steps with no predecessor inside that set; references from
//! steps outside the flow never count.
//!
//! Any gateway failure aborts the whole resolution. Nothing partial is ever
//! returned, so nothing partial can be cached.

use crate::error::{OrchestrationError, OrchestrationResult};
use crate::gateway::{GatewayError, ManagerGateway};
use crate::models::{
    AssignmentEntity, OrchestratedFlowEntity, OrchestrationCacheModel, StepEntity,
    StepNavigationData,
};
use crate::validation::validate_orchestrated_flow;
use futures::future::try_join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

pub struct WorkflowGraphResolver {
    gateway: Arc<dyn ManagerGateway>,
}

impl WorkflowGraphResolver {
    pub fn new(gateway: Arc<dyn ManagerGateway>) -> Self {
        Self { gateway }
    }

    /// Resolve a flow into a plan valid from now (the cache stamps the TTL)
    #[instrument(skip_all, fields(flow_id = %flow_id))]
    pub async fn resolve(&self, flow_id: Uuid) -> OrchestrationResult<OrchestrationCacheModel> {
        let flow = self
            .gateway
            .get_orchestrated_flow(flow_id)
            .await
            .map_err(|err| match err {
                GatewayError::NotFound { .. } => OrchestrationError::FlowNotFound { flow_id },
                other => other.into(),
            })?;
        validate_orchestrated_flow(&flow)?;

        let workflow = self.gateway.get_workflow(flow.workflow_id).await?;

        let assignments = try_join_all(
            flow.assignment_ids
                .iter()
                .map(|id| self.gateway.get_assignment(*id)),
        )
        .await?;

        let mut seeds: Vec<Uuid> = workflow.step_ids.clone();
        seeds.extend(assignments.iter().map(|a| a.step_id));

        let steps = self.fetch_closed_step_set(seeds).await?;
        let plan = build_plan(flow, steps, assignments);

        info!(
            flow_id = %flow_id,
            step_count = plan.step_entities.len(),
            entry_points = plan.entry_points.len(),
            processors = plan.processor_ids.len(),
            "🧭 Resolved orchestration plan"
        );
        Ok(plan)
    }

    /// Breadth-first fetch of every seed step and everything reachable from it
    async fn fetch_closed_step_set(&self, seeds: Vec<Uuid>) -> OrchestrationResult<Vec<StepEntity>> {
        let mut seen: HashSet<Uuid> = HashSet::new();
        let mut frontier: Vec<Uuid> = seeds.into_iter().filter(|id| seen.insert(*id)).collect();
        let mut steps = Vec::new();

        while !frontier.is_empty() {
            debug!(frontier = frontier.len(), "Fetching step layer");
            let layer = try_join_all(frontier.iter().map(|id| self.gateway.get_step(*id))).await?;

            frontier = layer
                .iter()
                .flat_map(|step| step.next_step_ids.iter().copied())
                .filter(|id| seen.insert(*id))
                .collect();
            steps.extend(layer);
        }

        Ok(steps)
    }
}

/// Assemble the plan from fetched entities; pure and deterministic
pub fn build_plan(
    flow: OrchestratedFlowEntity,
    steps: Vec<StepEntity>,
    assignments: Vec<AssignmentEntity>,
) -> OrchestrationCacheModel {
    let in_flow: HashSet<Uuid> = steps.iter().map(|s| s.id).collect();

    let mut previous: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for step in &steps {
        for next in step.next_step_ids.iter().filter(|id| in_flow.contains(id)) {
            let preds = previous.entry(*next).or_default();
            if !preds.contains(&step.id) {
                preds.push(step.id);
            }
        }
    }

    let entry_points: Vec<Uuid> = steps
        .iter()
        .filter(|s| previous.get(&s.id).map_or(true, Vec::is_empty))
        .map(|s| s.id)
        .collect();

    let mut processor_ids = Vec::new();
    for step in &steps {
        if !processor_ids.contains(&step.processor_id) {
            processor_ids.push(step.processor_id);
        }
    }

    let mut grouped: HashMap<Uuid, Vec<AssignmentEntity>> = HashMap::new();
    for assignment in assignments {
        grouped.entry(assignment.step_id).or_default().push(assignment);
    }

    let step_entities = steps
        .into_iter()
        .map(|step| {
            let mut seen = HashSet::new();
            let next_step_ids = step
                .next_step_ids
                .iter()
                .copied()
                .filter(|id| in_flow.contains(id) && seen.insert(*id))
                .collect();
            let nav = StepNavigationData {
                previous_step_ids: previous.remove(&step.id).unwrap_or_default(),
                next_step_ids,
                step,
            };
            (nav.step.id, nav)
        })
        .collect();

    OrchestrationCacheModel::new(flow, step_entities, processor_ids, grouped, entry_points)
}
