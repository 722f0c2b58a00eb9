use crate::lifecycle::PlanItemState;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const CASE_DEFINITION_SCHEMA_0_0_1: &str = "case-definition/0.0.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanItemKind {
    HumanTask,
    Task,
    Stage,
    Milestone,
    EventListener,
    UserEventListener,
    TimerEventListener,
}

impl PlanItemKind {
    pub fn is_stage(self) -> bool {
        self == PlanItemKind::Stage
    }

    /// Kinds that never execute: they go straight from available to completed.
    pub fn occurs_instantly(self) -> bool {
        matches!(
            self,
            PlanItemKind::Milestone
                | PlanItemKind::EventListener
                | PlanItemKind::UserEventListener
                | PlanItemKind::TimerEventListener
        )
    }

    /// Kinds that wait in `available` for an outside occurrence when they have no entry criteria.
    pub fn waits_for_occurrence(self) -> bool {
        matches!(
            self,
            PlanItemKind::EventListener | PlanItemKind::UserEventListener | PlanItemKind::TimerEventListener
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlanItemKind::HumanTask => "human_task",
            PlanItemKind::Task => "task",
            PlanItemKind::Stage => "stage",
            PlanItemKind::Milestone => "milestone",
            PlanItemKind::EventListener => "event_listener",
            PlanItemKind::UserEventListener => "user_event_listener",
            PlanItemKind::TimerEventListener => "timer_event_listener",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseDefinition {
    #[serde(default = "default_definition_schema")]
    pub schema: String,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub plan_model: PlanItemDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanItemDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub kind: PlanItemKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub manual_activation: bool,
    #[serde(default)]
    pub auto_complete: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry_criteria: Vec<Sentry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exit_criteria: Vec<Sentry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PlanItemDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub listeners: Vec<LifecycleListenerDefinition>,
}

impl PlanItemDefinition {
    pub fn new(id: impl Into<String>, kind: PlanItemKind) -> Self {
        Self {
            id: id.into(),
            name: None,
            kind,
            required: false,
            manual_activation: false,
            auto_complete: false,
            entry_criteria: Vec::new(),
            exit_criteria: Vec::new(),
            children: Vec::new(),
            timer_expression: None,
            listeners: Vec::new(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }

    pub fn sentries(&self, kind: SentryKind) -> &[Sentry] {
        match kind {
            SentryKind::Entry => &self.entry_criteria,
            SentryKind::Exit => &self.exit_criteria,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentryKind {
    Entry,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Sentry {
    pub id: String,
    #[serde(default)]
    pub on_parts: Vec<OnPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_part: Option<IfPart>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OnPart {
    pub source: String,
    pub state: PlanItemState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IfPart {
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LifecycleListenerDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_state: Option<PlanItemState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_state: Option<PlanItemState>,
    pub action: ListenerAction,
}

impl LifecycleListenerDefinition {
    pub fn matches(&self, from: PlanItemState, to: PlanItemState) -> bool {
        self.source_state.map_or(true, |state| state == from)
            && self.target_state.map_or(true, |state| state == to)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ListenerAction {
    SetVariables { variables: Map<String, Value> },
    Delegate { name: String },
}

fn default_definition_schema() -> String {
    CASE_DEFINITION_SCHEMA_0_0_1.to_string()
}

pub fn decode_case_definition_json(input: &str) -> serde_json::Result<CaseDefinition> {
    serde_json::from_str::<CaseDefinition>(input)
}

#[cfg(test)]
#[path = "definition_test.rs"]
mod tests;
