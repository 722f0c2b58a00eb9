use case_core::{PlanItemKind, PlanItemState, SentryKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmedSentry {
    pub kind: SentryKind,
    pub sentry_index: usize,
    pub on_parts: BTreeSet<usize>,
}

/// On-part marks accumulated for the sentries of one owner. Marks survive across units of work
/// and are only dropped when the sentry fires or the owner is removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentryMarks {
    #[serde(default)]
    armed: Vec<ArmedSentry>,
}

impl SentryMarks {
    pub fn arm(&mut self, kind: SentryKind, sentry_index: usize, on_parts: &[usize]) {
        match self
            .armed
            .iter_mut()
            .find(|entry| entry.kind == kind && entry.sentry_index == sentry_index)
        {
            Some(entry) => entry.on_parts.extend(on_parts.iter().copied()),
            None => self.armed.push(ArmedSentry {
                kind,
                sentry_index,
                on_parts: on_parts.iter().copied().collect(),
            }),
        }
    }

    pub fn armed_count(&self, kind: SentryKind, sentry_index: usize) -> usize {
        self.armed
            .iter()
            .find(|entry| entry.kind == kind && entry.sentry_index == sentry_index)
            .map_or(0, |entry| entry.on_parts.len())
    }

    pub fn consume(&mut self, kind: SentryKind, sentry_index: usize) {
        self.armed
            .retain(|entry| !(entry.kind == kind && entry.sentry_index == sentry_index));
    }

    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanItemInstance {
    pub id: String,
    pub case_instance_id: String,
    pub definition_id: String,
    pub name: String,
    pub kind: PlanItemKind,
    pub state: PlanItemState,
    /// Enclosing stage instance; `None` means the case plan model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub seq: u64,
    #[serde(default)]
    pub state_change_unprocessed: bool,
    #[serde(default)]
    pub completable: bool,
    #[serde(default)]
    pub completable_dirty: bool,
    #[serde(default, skip_serializing_if = "SentryMarks::is_empty")]
    pub sentry_marks: SentryMarks,
    pub created_at: DateTime<Utc>,
    pub last_transition_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl PlanItemInstance {
    pub fn is_stage(&self) -> bool {
        self.kind.is_stage()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

#[cfg(test)]
#[path = "plan_item_test.rs"]
mod tests;
