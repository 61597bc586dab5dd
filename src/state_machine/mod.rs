//! State types and decision tables for step routing and scheduling.
//!
//! - [`states`] - step outcomes, entry conditions and scheduler states
//! - [`entry_condition`] - the run/skip decision table applied at every step boundary

pub mod entry_condition;
pub mod states;

pub use entry_condition::{evaluate, evaluate_entry_point, evaluate_fan_in, EntryDecision};
pub use states::{ActivityExecutionStatus, ScheduleState, StepEntryCondition};
