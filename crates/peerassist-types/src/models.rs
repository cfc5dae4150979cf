use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a stored or submitted enum value is not recognised.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

// -- Task status --

/// Lifecycle status of a posted task.
///
/// Transitions only move forward: `Open -> In Progress -> Completed`, with
/// `Open -> Completed` allowed when a task finishes before it was fully
/// staffed, and `Open -> Cancelled` as a terminal side exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Only open tasks take new applicants or selections.
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Completed and cancelled tasks never change again.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Open, Self::InProgress)
                | (Self::Open, Self::Completed)
                | (Self::Open, Self::Cancelled)
                | (Self::InProgress, Self::Completed)
        )
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseEnumError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "Open" => Ok(Self::Open),
            "In Progress" => Ok(Self::InProgress),
            "Completed" => Ok(Self::Completed),
            "Cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseEnumError::new("task status", value)),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -- Work type --

/// Closed set of task categories. Values are case-sensitive on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkType {
    Plumbing,
    #[serde(rename = "House Shifting")]
    HouseShifting,
    Carpentry,
    Cleaning,
    Electrical,
    Painting,
    Gardening,
    Tutoring,
    #[serde(rename = "Computer Help")]
    ComputerHelp,
    Other,
}

impl WorkType {
    pub const ALL: [WorkType; 10] = [
        Self::Plumbing,
        Self::HouseShifting,
        Self::Carpentry,
        Self::Cleaning,
        Self::Electrical,
        Self::Painting,
        Self::Gardening,
        Self::Tutoring,
        Self::ComputerHelp,
        Self::Other,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plumbing => "Plumbing",
            Self::HouseShifting => "House Shifting",
            Self::Carpentry => "Carpentry",
            Self::Cleaning => "Cleaning",
            Self::Electrical => "Electrical",
            Self::Painting => "Painting",
            Self::Gardening => "Gardening",
            Self::Tutoring => "Tutoring",
            Self::ComputerHelp => "Computer Help",
            Self::Other => "Other",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|w| w.as_str()).collect()
    }
}

impl TryFrom<&str> for WorkType {
    type Error = ParseEnumError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|w| w.as_str() == value)
            .ok_or_else(|| ParseEnumError::new("work type", value))
    }
}

impl fmt::Display for WorkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -- OTP context --

/// What a one-time code was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpContext {
    PasswordReset,
    TaskCompletion,
}

impl OtpContext {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PasswordReset => "password_reset",
            Self::TaskCompletion => "task_completion",
        }
    }
}

impl fmt::Display for OtpContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -- Scheduled task status --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScheduleStatus {
    Scheduled,
    Completed,
}

impl ScheduleStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "Scheduled",
            Self::Completed => "Completed",
        }
    }
}

impl TryFrom<&str> for ScheduleStatus {
    type Error = ParseEnumError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "Scheduled" => Ok(Self::Scheduled),
            "Completed" => Ok(Self::Completed),
            _ => Err(ParseEnumError::new("schedule status", value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATUSES: [TaskStatus; 4] = [
        TaskStatus::Open,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Cancelled,
    ];

    #[test]
    fn transitions_never_move_backward() {
        for from in ALL_STATUSES {
            assert!(!from.can_transition_to(TaskStatus::Open), "{from} -> Open");
            assert!(!from.can_transition_to(from), "{from} -> {from}");
        }
        for terminal in [TaskStatus::Completed, TaskStatus::Cancelled] {
            for next in ALL_STATUSES {
                assert!(!terminal.can_transition_to(next));
            }
        }
        let in_progress = TaskStatus::InProgress;
        assert!(!in_progress.can_transition_to(TaskStatus::Cancelled));
    }

    #[test]
    fn forward_transitions_are_allowed() {
        assert!(TaskStatus::Open.can_transition_to(TaskStatus::InProgress));
        assert!(TaskStatus::Open.can_transition_to(TaskStatus::Completed));
        assert!(TaskStatus::Open.can_transition_to(TaskStatus::Cancelled));
        let in_progress = TaskStatus::InProgress;
        assert!(in_progress.can_transition_to(TaskStatus::Completed));
    }

    #[test]
    fn status_uses_display_names_on_the_wire() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"In Progress\"");
        assert_eq!(
            TaskStatus::try_from("In Progress"),
            Ok(TaskStatus::InProgress)
        );
        assert!(TaskStatus::try_from("in progress").is_err());
    }

    #[test]
    fn work_type_matching_is_case_sensitive() {
        assert_eq!(
            WorkType::try_from("Computer Help"),
            Ok(WorkType::ComputerHelp)
        );
        assert_eq!(
            WorkType::try_from("House Shifting"),
            Ok(WorkType::HouseShifting)
        );
        assert!(WorkType::try_from("cleaning").is_err());
        assert!(WorkType::try_from("Cooking").is_err());
        assert_eq!(WorkType::names().len(), 10);
    }
}
