use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanItemState {
    Available,
    Enabled,
    Active,
    Completed,
    Terminated,
    Unavailable,
}

impl PlanItemState {
    pub const ALL: [PlanItemState; 6] = [
        PlanItemState::Available,
        PlanItemState::Enabled,
        PlanItemState::Active,
        PlanItemState::Completed,
        PlanItemState::Terminated,
        PlanItemState::Unavailable,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PlanItemState::Completed | PlanItemState::Terminated | PlanItemState::Unavailable
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlanItemState::Available => "available",
            PlanItemState::Enabled => "enabled",
            PlanItemState::Active => "active",
            PlanItemState::Completed => "completed",
            PlanItemState::Terminated => "terminated",
            PlanItemState::Unavailable => "unavailable",
        }
    }
}

impl Display for PlanItemState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanItemTransition {
    Enable,
    Start,
    ManualStart,
    Complete,
    Occur,
    Exit,
    Terminate,
    ParentExit,
}

impl PlanItemTransition {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanItemTransition::Enable => "enable",
            PlanItemTransition::Start => "start",
            PlanItemTransition::ManualStart => "manual_start",
            PlanItemTransition::Complete => "complete",
            PlanItemTransition::Occur => "occur",
            PlanItemTransition::Exit => "exit",
            PlanItemTransition::Terminate => "terminate",
            PlanItemTransition::ParentExit => "parent_exit",
        }
    }

    /// Target state of `self` applied to `from`, or `None` when the table has no entry.
    pub fn target_state(self, from: PlanItemState) -> Option<PlanItemState> {
        use PlanItemState::{Active, Available, Completed, Enabled, Terminated, Unavailable};
        match (self, from) {
            (PlanItemTransition::Enable, Available) => Some(Enabled),
            (PlanItemTransition::Start, Available) => Some(Active),
            (PlanItemTransition::ManualStart, Enabled) => Some(Active),
            (PlanItemTransition::Complete, Active) => Some(Completed),
            (PlanItemTransition::Occur, Available | Enabled) => Some(Completed),
            (PlanItemTransition::Exit | PlanItemTransition::Terminate, Available | Enabled | Active) => {
                Some(Terminated)
            }
            (PlanItemTransition::ParentExit, Active) => Some(Terminated),
            (PlanItemTransition::ParentExit, Available | Enabled) => Some(Unavailable),
            _ => None,
        }
    }
}

impl Display for PlanItemTransition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("transition `{transition}` is not allowed from state `{from}`")]
pub struct TransitionError {
    pub transition: PlanItemTransition,
    pub from: PlanItemState,
}

pub fn resolve_transition(
    from: PlanItemState,
    transition: PlanItemTransition,
) -> Result<PlanItemState, TransitionError> {
    transition
        .target_state(from)
        .ok_or(TransitionError { transition, from })
}

#[cfg(test)]
#[path = "lifecycle_test.rs"]
mod tests;
