use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome a step execution reports back to the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityExecutionStatus {
    /// Step accepted the work and is still processing it
    Processing,
    /// Step finished successfully
    Completed,
    /// Step failed, timed out or could not be loaded
    Failed,
    /// Step was cancelled before completion
    Cancelled,
}

impl ActivityExecutionStatus {
    pub const ALL: [ActivityExecutionStatus; 4] = [
        Self::Processing,
        Self::Completed,
        Self::Failed,
        Self::Cancelled,
    ];

    /// Check if this is a terminal state (the step will report nothing further)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for ActivityExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for ActivityExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid activity execution status: {s}")),
        }
    }
}

/// Policy gating whether a step runs, given its predecessor's outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepEntryCondition {
    PreviousProcessing,
    #[default]
    PreviousCompleted,
    PreviousFailed,
    PreviousCancelled,
    Always,
    Never,
}

impl StepEntryCondition {
    pub const ALL: [StepEntryCondition; 6] = [
        Self::PreviousProcessing,
        Self::PreviousCompleted,
        Self::PreviousFailed,
        Self::PreviousCancelled,
        Self::Always,
        Self::Never,
    ];
}

impl fmt::Display for StepEntryCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreviousProcessing => write!(f, "previous_processing"),
            Self::PreviousCompleted => write!(f, "previous_completed"),
            Self::PreviousFailed => write!(f, "previous_failed"),
            Self::PreviousCancelled => write!(f, "previous_cancelled"),
            Self::Always => write!(f, "always"),
            Self::Never => write!(f, "never"),
        }
    }
}

/// Per-flow scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleState {
    #[default]
    Stopped,
    Scheduled,
    Firing,
}

impl ScheduleState {
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Stopped)
    }
}

impl fmt::Display for ScheduleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Scheduled => write!(f, "scheduled"),
            Self::Firing => write!(f, "firing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_status_terminal_check() {
        assert!(ActivityExecutionStatus::Completed.is_terminal());
        assert!(ActivityExecutionStatus::Failed.is_terminal());
        assert!(ActivityExecutionStatus::Cancelled.is_terminal());
        assert!(!ActivityExecutionStatus::Processing.is_terminal());
    }

    #[test]
    fn test_status_string_conversion() {
        assert_eq!(ActivityExecutionStatus::Cancelled.to_string(), "cancelled");
        assert_eq!(
            "failed".parse::<ActivityExecutionStatus>().unwrap(),
            ActivityExecutionStatus::Failed
        );
        assert!("done".parse::<ActivityExecutionStatus>().is_err());
    }

    #[test]
    fn test_entry_condition_defaults_to_previous_completed() {
        assert_eq!(
            StepEntryCondition::default(),
            StepEntryCondition::PreviousCompleted
        );
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&StepEntryCondition::PreviousFailed).unwrap();
        assert_eq!(json, "\"previous_failed\"");

        let parsed: ScheduleState = serde_json::from_str("\"firing\"").unwrap();
        assert_eq!(parsed, ScheduleState::Firing);
        assert!(parsed.is_active());
    }
}
