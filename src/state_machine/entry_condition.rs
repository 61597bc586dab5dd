//! # Step Entry-Condition Engine
//!
//! Pure decision table mapping a predecessor outcome and a successor's entry
//! condition to run/skip. No I/O.
//!
//! | Entry condition      | Runs when predecessor outcome is |
//! |----------------------|----------------------------------|
//! | `PreviousProcessing` | `Processing`                     |
//! | `PreviousCompleted`  | `Completed`                      |
//! | `PreviousFailed`     | `Failed`                         |
//! | `PreviousCancelled`  | `Cancelled`                      |
//! | `Always`             | any outcome                      |
//! | `Never`              | nothing                          |
//!
//! Fan-in is edge-level OR: a step with several predecessors runs when the
//! condition holds for at least one of their outcomes.

use super::states::{ActivityExecutionStatus, StepEntryCondition};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryDecision {
    Run,
    Skip,
}

impl EntryDecision {
    pub fn should_run(&self) -> bool {
        matches!(self, Self::Run)
    }

    fn from_bool(run: bool) -> Self {
        if run {
            Self::Run
        } else {
            Self::Skip
        }
    }
}

/// Evaluate one predecessor edge
pub fn evaluate(
    predecessor_outcome: ActivityExecutionStatus,
    condition: StepEntryCondition,
) -> EntryDecision {
    use ActivityExecutionStatus as Outcome;
    use StepEntryCondition as Condition;

    let run = match condition {
        Condition::PreviousProcessing => predecessor_outcome == Outcome::Processing,
        Condition::PreviousCompleted => predecessor_outcome == Outcome::Completed,
        Condition::PreviousFailed => predecessor_outcome == Outcome::Failed,
        Condition::PreviousCancelled => predecessor_outcome == Outcome::Cancelled,
        Condition::Always => true,
        Condition::Never => false,
    };
    EntryDecision::from_bool(run)
}

/// Evaluate a step with no in-flow predecessor
pub fn evaluate_entry_point(condition: StepEntryCondition) -> EntryDecision {
    EntryDecision::from_bool(condition != StepEntryCondition::Never)
}

/// Evaluate every incoming edge independently and OR the results.
///
/// An empty outcome set means no predecessor actually executed, so there is
/// nothing to satisfy the condition and the step is skipped.
pub fn evaluate_fan_in<I>(predecessor_outcomes: I, condition: StepEntryCondition) -> EntryDecision
where
    I: IntoIterator<Item = ActivityExecutionStatus>,
{
    let run = predecessor_outcomes
        .into_iter()
        .any(|outcome| evaluate(outcome, condition).should_run());
    EntryDecision::from_bool(run)
}
