//! # Flow Scheduler
//!
//! Cron-driven triggering of orchestrated flows. Each scheduled flow owns one
//! tokio task that sleeps until the next tick, marks the job `Firing`, hands
//! the flow to the [`FlowTrigger`] on a separate task and returns to
//! `Scheduled`. Dispatch never blocks the next tick.
//!
//! One-time jobs remove themselves after their first dispatch. Stopping a job
//! prevents future ticks but never cancels an execution already dispatched.
//!
//! Schedules are not persisted as live timers: on startup [`FlowScheduler::recover`]
//! re-registers every flow whose schedule is enabled.

use crate::config::SchedulerConfig;
use crate::error::{OrchestrationError, OrchestrationResult};
use crate::events::{EventPublisher, OrchestrationEvent};
use crate::gateway::ManagerGateway;
use crate::logging::{log_error, log_schedule_operation};
use crate::models::OrchestratedFlowEntity;
use crate::state_machine::ScheduleState;
use crate::validation::{validate_cron_expression, validate_orchestrated_flow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cron::Schedule;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Execution entry point the scheduler dispatches to
#[async_trait]
pub trait FlowTrigger: Send + Sync {
    async fn trigger(&self, flow_id: Uuid) -> OrchestrationResult<()>;
}

struct ScheduledJob {
    job_id: Uuid,
    cron_expression: String,
    one_time: bool,
    state: ScheduleState,
    handle: JoinHandle<()>,
}

type JobTable = Arc<Mutex<HashMap<Uuid, ScheduledJob>>>;

/// Public view of one registered job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleInfo {
    pub flow_id: Uuid,
    pub cron_expression: String,
    pub one_time: bool,
    pub state: ScheduleState,
}

/// Outcome of restart recovery
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    pub restored: Vec<Uuid>,
    pub failed: Vec<(Uuid, String)>,
}

pub struct FlowScheduler {
    jobs: JobTable,
    trigger: Arc<dyn FlowTrigger>,
    gateway: Arc<dyn ManagerGateway>,
    events: Option<EventPublisher>,
    config: SchedulerConfig,
}

impl FlowScheduler {
    pub fn new(
        trigger: Arc<dyn FlowTrigger>,
        gateway: Arc<dyn ManagerGateway>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            trigger,
            gateway,
            events: None,
            config,
        }
    }

    pub fn with_events(mut self, events: EventPublisher) -> Self {
        self.events = Some(events);
        self
    }

    /// Register (or replace) the cron job for a flow.
    ///
    /// The expression is validated before any job state changes.
    pub async fn start(
        &self,
        flow_id: Uuid,
        cron_expression: &str,
        one_time: bool,
    ) -> OrchestrationResult<()> {
        let schedule = validate_cron_expression(cron_expression)?;

        if !self.config.enabled {
            return Err(OrchestrationError::SchedulerError {
                flow_id,
                reason: "scheduler is disabled".to_string(),
            });
        }

        let job_id = Uuid::new_v4();
        let replaced = {
            let mut jobs = self.jobs.lock();
            let handle = spawn_job(
                self.jobs.clone(),
                self.trigger.clone(),
                self.events.clone(),
                flow_id,
                job_id,
                schedule,
                one_time,
            );
            jobs.insert(
                flow_id,
                ScheduledJob {
                    job_id,
                    cron_expression: cron_expression.to_string(),
                    one_time,
                    state: ScheduleState::Scheduled,
                    handle,
                },
            )
        };

        if let Some(previous) = replaced {
            previous.handle.abort();
            debug!(flow_id = %flow_id, "Replaced existing schedule");
        }

        log_schedule_operation("start", flow_id, Some(cron_expression), "scheduled", None);
        if let Some(events) = &self.events {
            events.publish(OrchestrationEvent::ScheduleStarted {
                flow_id,
                cron_expression: cron_expression.to_string(),
                one_time,
            });
        }
        Ok(())
    }

    /// Stop future ticks; returns whether a job existed
    pub async fn stop(&self, flow_id: Uuid) -> bool {
        let removed = self.jobs.lock().remove(&flow_id);
        match removed {
            Some(job) => {
                job.handle.abort();
                log_schedule_operation("stop", flow_id, Some(&job.cron_expression), "stopped", None);
                if let Some(events) = &self.events {
                    events.publish(OrchestrationEvent::ScheduleStopped { flow_id });
                }
                true
            }
            None => false,
        }
    }

    pub fn state(&self, flow_id: Uuid) -> ScheduleState {
        self.jobs
            .lock()
            .get(&flow_id)
            .map(|job| job.state)
            .unwrap_or(ScheduleState::Stopped)
    }

    pub fn info(&self, flow_id: Uuid) -> Option<ScheduleInfo> {
        self.jobs.lock().get(&flow_id).map(|job| ScheduleInfo {
            flow_id,
            cron_expression: job.cron_expression.clone(),
            one_time: job.one_time,
            state: job.state,
        })
    }

    pub fn scheduled_flows(&self) -> Vec<Uuid> {
        self.jobs.lock().keys().copied().collect()
    }

    /// Bring the job in line with a flow's declared schedule
    pub async fn apply_flow(&self, flow: &OrchestratedFlowEntity) -> OrchestrationResult<()> {
        validate_orchestrated_flow(flow)?;
        match flow.active_schedule() {
            Some(cron_expression) => {
                self.start(flow.id, cron_expression, flow.is_one_time_execution)
                    .await
            }
            None => {
                self.stop(flow.id).await;
                Ok(())
            }
        }
    }

    /// Re-register every schedule-enabled flow after a restart
    pub async fn recover(&self) -> OrchestrationResult<RecoveryReport> {
        let flows = self.gateway.get_scheduled_flows().await?;
        let mut report = RecoveryReport::default();

        for flow in flows {
            match self.apply_flow(&flow).await {
                Ok(()) => report.restored.push(flow.id),
                Err(err) => {
                    log_error("scheduler", "recover", &err.to_string(), Some(&flow.id.to_string()));
                    report.failed.push((flow.id, err.to_string()));
                }
            }
        }

        info!(
            restored = report.restored.len(),
            failed = report.failed.len(),
            "⏰ Scheduler recovery complete"
        );
        Ok(report)
    }

    /// Abort every job
    pub fn shutdown(&self) {
        let jobs: Vec<_> = self.jobs.lock().drain().collect();
        for (flow_id, job) in jobs {
            job.handle.abort();
            debug!(flow_id = %flow_id, "Aborted schedule on shutdown");
        }
    }
}

impl Drop for FlowScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Update a job's state if the job is still the one registered for the flow
fn set_state(jobs: &JobTable, flow_id: Uuid, job_id: Uuid, state: ScheduleState) -> bool {
    match jobs.lock().get_mut(&flow_id) {
        Some(job) if job.job_id == job_id => {
            job.state = state;
            true
        }
        _ => false,
    }
}

fn remove_if_current(jobs: &JobTable, flow_id: Uuid, job_id: Uuid) -> bool {
    let mut jobs = jobs.lock();
    if jobs.get(&flow_id).map(|job| job.job_id) == Some(job_id) {
        jobs.remove(&flow_id);
        true
    } else {
        false
    }
}

fn spawn_job(
    jobs: JobTable,
    trigger: Arc<dyn FlowTrigger>,
    events: Option<EventPublisher>,
    flow_id: Uuid,
    job_id: Uuid,
    schedule: Schedule,
    one_time: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_tick: Option<DateTime<Utc>> = None;
        loop {
            let now = Utc::now();
            // never fire the same tick twice when the timer wakes early
            let from = last_tick.map_or(now, |tick| now.max(tick));
            let Some(next_tick) = schedule.after(&from).next() else {
                warn!(flow_id = %flow_id, "Cron schedule has no future ticks");
                remove_if_current(&jobs, flow_id, job_id);
                return;
            };
            let wait = (next_tick - now).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;
            last_tick = Some(next_tick);

            if !set_state(&jobs, flow_id, job_id, ScheduleState::Firing) {
                return;
            }

            debug!(flow_id = %flow_id, tick = %next_tick, "Dispatching scheduled flow");
            let dispatch = trigger.clone();
            tokio::spawn(async move {
                if let Err(err) = dispatch.trigger(flow_id).await {
                    log_error("scheduler", "trigger", &err.to_string(), Some(&flow_id.to_string()));
                }
            });
            if let Some(events) = &events {
                events.publish(OrchestrationEvent::ScheduleFired { flow_id });
            }

            if !set_state(&jobs, flow_id, job_id, ScheduleState::Scheduled) {
                return;
            }

            if one_time {
                if remove_if_current(&jobs, flow_id, job_id) {
                    log_schedule_operation("fire", flow_id, None, "stopped", Some("one-time execution"));
                    if let Some(events) = &events {
                        events.publish(OrchestrationEvent::ScheduleStopped { flow_id });
                    }
                }
                return;
            }
        }
    })
}
