use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::SurveyWindow;

/// Phase of a survey relative to its activity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    NotStarted,
    Running,
    Ended,
}

impl LifecycleState {
    pub fn label(&self) -> &'static str {
        match self {
            LifecycleState::NotStarted => "not started",
            LifecycleState::Running => "running",
            LifecycleState::Ended => "ended",
        }
    }
}

/// Classifies `now` against an inclusive `[start, end]` window.
///
/// An inverted window (start after end) is never `Running`.
pub fn classify(window: &SurveyWindow, now: DateTime<Utc>) -> LifecycleState {
    if now < window.start_time {
        LifecycleState::NotStarted
    } else if now <= window.end_time {
        LifecycleState::Running
    } else {
        LifecycleState::Ended
    }
}

/// Operations gated by the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SurveyOperation {
    Create,
    Edit,
    Delete,
    Submit,
    ParticipantRead,
    AdminRead,
}

impl SurveyOperation {
    pub fn label(&self) -> &'static str {
        match self {
            SurveyOperation::Create => "create",
            SurveyOperation::Edit => "edit",
            SurveyOperation::Delete => "delete",
            SurveyOperation::Submit => "submit",
            SurveyOperation::ParticipantRead => "participant read",
            SurveyOperation::AdminRead => "admin read",
        }
    }

    pub fn permits(&self, state: LifecycleState) -> bool {
        match self {
            SurveyOperation::Create | SurveyOperation::AdminRead => true,
            SurveyOperation::Edit | SurveyOperation::Delete => {
                state == LifecycleState::NotStarted
            }
            SurveyOperation::Submit | SurveyOperation::ParticipantRead => {
                state == LifecycleState::Running
            }
        }
    }
}

/// Raised when an operation is attempted outside its permitted phase.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot {} a survey that is {}", operation.label(), state.label())]
pub struct LifecycleViolation {
    pub operation: SurveyOperation,
    pub state: LifecycleState,
}

/// Classifies the window and rejects the operation if the phase forbids it.
pub fn require(
    window: &SurveyWindow,
    now: DateTime<Utc>,
    operation: SurveyOperation,
) -> Result<LifecycleState, LifecycleViolation> {
    let state = classify(window, now);
    if operation.permits(state) {
        Ok(state)
    } else {
        Err(LifecycleViolation { operation, state })
    }
}
