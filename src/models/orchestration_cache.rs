use super::assignment::AssignmentEntity;
use super::orchestrated_flow::OrchestratedFlowEntity;
use super::step::StepEntity;
use crate::constants::system::ORCHESTRATION_CACHE_VERSION;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// Step plus its in-flow linkage, so traversal never re-queries the graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepNavigationData {
    pub step: StepEntity,
    /// In-flow steps naming this one in their `next_step_ids`
    pub previous_step_ids: Vec<Uuid>,
    /// This step's successors, all present in the plan
    pub next_step_ids: Vec<Uuid>,
}

impl StepNavigationData {
    pub fn is_entry_point(&self) -> bool {
        self.previous_step_ids.is_empty()
    }
}

/// Resolved, cacheable execution plan for one orchestrated flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationCacheModel {
    pub orchestrated_flow_id: Uuid,
    pub orchestrated_flow: OrchestratedFlowEntity,
    pub step_entities: HashMap<Uuid, StepNavigationData>,
    pub processor_ids: Vec<Uuid>,
    pub assignments: HashMap<Uuid, Vec<AssignmentEntity>>,
    pub entry_points: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub version: String,
}

impl OrchestrationCacheModel {
    /// Build a plan that is valid from now; the cache stamps the real TTL on store
    pub fn new(
        orchestrated_flow: OrchestratedFlowEntity,
        step_entities: HashMap<Uuid, StepNavigationData>,
        processor_ids: Vec<Uuid>,
        assignments: HashMap<Uuid, Vec<AssignmentEntity>>,
        entry_points: Vec<Uuid>,
    ) -> Self {
        let now = Utc::now();
        Self {
            orchestrated_flow_id: orchestrated_flow.id,
            orchestrated_flow,
            step_entities,
            processor_ids,
            assignments,
            entry_points,
            created_at: now,
            expires_at: now,
            version: ORCHESTRATION_CACHE_VERSION.to_string(),
        }
    }

    /// Restamp the validity window
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        let now = Utc::now();
        let ttl = ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::MAX);
        self.created_at = now;
        self.expires_at = now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        self
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Expired once `now` reaches `expires_at`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_current_version(&self) -> bool {
        self.version == ORCHESTRATION_CACHE_VERSION
    }

    pub fn workflow_id(&self) -> Uuid {
        self.orchestrated_flow.workflow_id
    }

    pub fn step(&self, step_id: &Uuid) -> Option<&StepNavigationData> {
        self.step_entities.get(step_id)
    }

    pub fn assignments_for(&self, step_id: &Uuid) -> &[AssignmentEntity] {
        self.assignments
            .get(step_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Closed-graph check: entry points and every successor exist in the plan
    pub fn is_closed(&self) -> bool {
        self.entry_points
            .iter()
            .all(|id| self.step_entities.contains_key(id))
            && self.step_entities.values().all(|nav| {
                nav.next_step_ids
                    .iter()
                    .chain(nav.previous_step_ids.iter())
                    .all(|id| self.step_entities.contains_key(id))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> OrchestrationCacheModel {
        let flow = OrchestratedFlowEntity::new(Uuid::new_v4(), Uuid::new_v4());
        OrchestrationCacheModel::new(flow, HashMap::new(), vec![], HashMap::new(), vec![])
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let plan = plan().with_ttl(Duration::from_secs(60));
        assert!(!plan.is_expired_at(plan.expires_at - ChronoDuration::milliseconds(1)));
        assert!(plan.is_expired_at(plan.expires_at));
        assert!(!plan.is_expired());
    }

    #[test]
    fn test_zero_ttl_is_immediately_expired() {
        assert!(plan().with_ttl(Duration::ZERO).is_expired());
    }

    #[test]
    fn test_dangling_edge_breaks_closure() {
        let mut plan = plan();
        let a = Uuid::new_v4();
        let step = StepEntity::new(a, Uuid::new_v4());
        plan.step_entities.insert(
            a,
            StepNavigationData {
                step,
                previous_step_ids: vec![],
                next_step_ids: vec![Uuid::new_v4()],
            },
        );
        plan.entry_points = vec![a];
        assert!(!plan.is_closed());
    }
}
