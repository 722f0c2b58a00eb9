use crate::model::milestone::MilestoneInstance;
use crate::model::plan_item::{PlanItemInstance, SentryMarks};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseState {
    Active,
    Completed,
    Terminated,
}

impl CaseState {
    pub fn is_ended(self) -> bool {
        self != CaseState::Active
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CaseState::Active => "active",
            CaseState::Completed => "completed",
            CaseState::Terminated => "terminated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerJob {
    pub id: String,
    pub plan_item_instance_id: String,
    pub timer_expression: String,
    #[serde(default)]
    pub executable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseInstance {
    pub id: String,
    pub definition_key: String,
    pub definition_version: u32,
    pub definition_hash: String,
    pub state: CaseState,
    /// Optimistic concurrency counter, bumped by every successful commit.
    #[serde(default)]
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_type: Option<String>,
    #[serde(default)]
    pub variables: Map<String, Value>,
    #[serde(default)]
    pub plan_items: BTreeMap<String, PlanItemInstance>,
    #[serde(default, skip_serializing_if = "SentryMarks::is_empty")]
    pub root_sentry_marks: SentryMarks,
    #[serde(default)]
    pub state_change_unprocessed: bool,
    #[serde(default)]
    pub completable: bool,
    #[serde(default)]
    pub completable_dirty: bool,
    #[serde(default)]
    pub milestones: Vec<MilestoneInstance>,
    #[serde(default)]
    pub timer_jobs: BTreeMap<String, TimerJob>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_event_seq: u64,
    #[serde(default)]
    pub next_plan_item_seq: u64,
}

impl CaseInstance {
    pub fn new(
        id: impl Into<String>,
        definition_key: impl Into<String>,
        definition_version: u32,
        definition_hash: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            definition_key: definition_key.into(),
            definition_version,
            definition_hash: definition_hash.into(),
            state: CaseState::Active,
            version: 0,
            name: None,
            business_key: None,
            business_status: None,
            callback_id: None,
            callback_type: None,
            variables: Map::new(),
            plan_items: BTreeMap::new(),
            root_sentry_marks: SentryMarks::default(),
            state_change_unprocessed: false,
            completable: false,
            completable_dirty: true,
            milestones: Vec::new(),
            timer_jobs: BTreeMap::new(),
            started_at,
            ended_at: None,
            next_event_seq: 0,
            next_plan_item_seq: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == CaseState::Active
    }

    pub fn plan_item(&self, id: &str) -> Option<&PlanItemInstance> {
        self.plan_items.get(id)
    }

    pub fn plan_item_mut(&mut self, id: &str) -> Option<&mut PlanItemInstance> {
        self.plan_items.get_mut(id)
    }

    /// Direct children of a stage instance, or of the plan model when `parent_id` is `None`,
    /// in creation order.
    pub fn children_of(&self, parent_id: Option<&str>) -> Vec<&PlanItemInstance> {
        let mut children = self
            .plan_items
            .values()
            .filter(|item| item.parent_id.as_deref() == parent_id)
            .collect::<Vec<_>>();
        children.sort_by_key(|item| item.seq);
        children
    }

    /// Ids of every descendant of `parent_id`, children listed before their parents.
    pub fn descendants_post_order(&self, parent_id: Option<&str>) -> Vec<String> {
        let mut out = Vec::new();
        for child in self.children_of(parent_id) {
            out.extend(self.descendants_post_order(Some(child.id.as_str())));
            out.push(child.id.clone());
        }
        out
    }

    /// Enclosing stage ids of `id`, nearest first. The plan model is not included.
    pub fn ancestors_of(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = self.plan_items.get(id).and_then(|item| item.parent_id.clone());
        while let Some(parent_id) = current {
            current = self
                .plan_items
                .get(&parent_id)
                .and_then(|item| item.parent_id.clone());
            out.push(parent_id);
        }
        out
    }

    pub fn instances_of<'a>(&'a self, definition_id: &'a str) -> impl Iterator<Item = &'a PlanItemInstance> + 'a {
        self.plan_items
            .values()
            .filter(move |item| item.definition_id == definition_id)
    }

    /// Removes every descendant of `stage_id` from the arena along with their timer jobs.
    pub fn remove_descendants(&mut self, stage_id: &str) -> Vec<String> {
        let removed = self.descendants_post_order(Some(stage_id));
        for id in &removed {
            self.plan_items.remove(id);
        }
        self.timer_jobs
            .retain(|_, job| !removed.contains(&job.plan_item_instance_id));
        removed
    }

    pub fn timer_job_for(&self, plan_item_instance_id: &str) -> Option<&TimerJob> {
        self.timer_jobs
            .values()
            .find(|job| job.plan_item_instance_id == plan_item_instance_id)
    }
}

#[cfg(test)]
#[path = "case_test.rs"]
mod tests;
