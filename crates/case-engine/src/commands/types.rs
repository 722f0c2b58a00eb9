use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

pub const CASE_COMMAND_SCHEMA_0_0_1: &str = "case-engine-command/0.0.1";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StartCaseRequest {
    pub definition_key: String,
    #[serde(default)]
    pub variables: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_type: Option<String>,
}

impl StartCaseRequest {
    pub fn new(definition_key: impl Into<String>) -> Self {
        Self {
            definition_key: definition_key.into(),
            ..Self::default()
        }
    }
}

/// Addresses a plan item instance either by id, or by name inside one case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanItemTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_item_instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl PlanItemTarget {
    pub fn by_id(plan_item_instance_id: impl Into<String>) -> Self {
        Self {
            plan_item_instance_id: Some(plan_item_instance_id.into()),
            ..Self::default()
        }
    }

    pub fn by_name(case_instance_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            plan_item_instance_id: None,
            case_instance_id: Some(case_instance_id.into()),
            name: Some(name.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CaseCommand {
    StartCase(StartCaseRequest),
    /// Manual start of an enabled item.
    StartPlanItem(PlanItemTarget),
    /// Completes an active item, or makes a waiting event listener occur.
    TriggerPlanItem(PlanItemTarget),
    CompletePlanItem(PlanItemTarget),
    TerminatePlanItem(PlanItemTarget),
    CompleteUserEventListener(PlanItemTarget),
    TerminateCase {
        case_instance_id: String,
    },
    CompleteCase {
        case_instance_id: String,
    },
    SetCaseName {
        case_instance_id: String,
        #[serde(default)]
        name: Option<String>,
    },
    SetBusinessStatus {
        case_instance_id: String,
        #[serde(default)]
        business_status: Option<String>,
    },
    SetVariables {
        case_instance_id: String,
        variables: Map<String, Value>,
    },
    MoveTimerToExecutable {
        job_id: String,
    },
    ExecuteJob {
        job_id: String,
    },
    /// Recomputes the completable flag of a stage, or of the case root when no stage is given,
    /// without completing anything.
    EvaluateCompletable {
        case_instance_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        plan_item_instance_id: Option<String>,
    },
}

impl CaseCommand {
    pub fn command_type(&self) -> &'static str {
        match self {
            CaseCommand::StartCase(_) => "start_case",
            CaseCommand::StartPlanItem(_) => "start_plan_item",
            CaseCommand::TriggerPlanItem(_) => "trigger_plan_item",
            CaseCommand::CompletePlanItem(_) => "complete_plan_item",
            CaseCommand::TerminatePlanItem(_) => "terminate_plan_item",
            CaseCommand::CompleteUserEventListener(_) => "complete_user_event_listener",
            CaseCommand::TerminateCase { .. } => "terminate_case",
            CaseCommand::CompleteCase { .. } => "complete_case",
            CaseCommand::SetCaseName { .. } => "set_case_name",
            CaseCommand::SetBusinessStatus { .. } => "set_business_status",
            CaseCommand::SetVariables { .. } => "set_variables",
            CaseCommand::MoveTimerToExecutable { .. } => "move_timer_to_executable",
            CaseCommand::ExecuteJob { .. } => "execute_job",
            CaseCommand::EvaluateCompletable { .. } => "evaluate_completable",
        }
    }

    /// Case the command names explicitly, if any. Id-addressed targets and job commands
    /// have to be located through the store.
    pub fn case_instance_id(&self) -> Option<&str> {
        match self {
            CaseCommand::StartCase(_)
            | CaseCommand::MoveTimerToExecutable { .. }
            | CaseCommand::ExecuteJob { .. } => None,
            CaseCommand::StartPlanItem(target)
            | CaseCommand::TriggerPlanItem(target)
            | CaseCommand::CompletePlanItem(target)
            | CaseCommand::TerminatePlanItem(target)
            | CaseCommand::CompleteUserEventListener(target) => target.case_instance_id.as_deref(),
            CaseCommand::TerminateCase { case_instance_id }
            | CaseCommand::CompleteCase { case_instance_id }
            | CaseCommand::SetCaseName {
                case_instance_id, ..
            }
            | CaseCommand::SetBusinessStatus {
                case_instance_id, ..
            }
            | CaseCommand::SetVariables {
                case_instance_id, ..
            }
            | CaseCommand::EvaluateCompletable {
                case_instance_id, ..
            } => Some(case_instance_id.as_str()),
        }
    }

    pub fn plan_item_target(&self) -> Option<&PlanItemTarget> {
        match self {
            CaseCommand::StartPlanItem(target)
            | CaseCommand::TriggerPlanItem(target)
            | CaseCommand::CompletePlanItem(target)
            | CaseCommand::TerminatePlanItem(target)
            | CaseCommand::CompleteUserEventListener(target) => Some(target),
            _ => None,
        }
    }

    pub fn job_id(&self) -> Option<&str> {
        match self {
            CaseCommand::MoveTimerToExecutable { job_id } | CaseCommand::ExecuteJob { job_id } => {
                Some(job_id.as_str())
            }
            _ => None,
        }
    }

    /// Rewrites every case id equal to `placeholder` into `case_instance_id`.
    pub fn bind_case_placeholder(&mut self, placeholder: &str, case_instance_id: &str) {
        let bind = |slot: &mut String| {
            if slot.as_str() == placeholder {
                *slot = case_instance_id.to_string();
            }
        };
        match self {
            CaseCommand::StartCase(_)
            | CaseCommand::MoveTimerToExecutable { .. }
            | CaseCommand::ExecuteJob { .. } => {}
            CaseCommand::StartPlanItem(target)
            | CaseCommand::TriggerPlanItem(target)
            | CaseCommand::CompletePlanItem(target)
            | CaseCommand::TerminatePlanItem(target)
            | CaseCommand::CompleteUserEventListener(target) => {
                if let Some(slot) = target.case_instance_id.as_mut() {
                    bind(slot);
                }
            }
            CaseCommand::TerminateCase { case_instance_id }
            | CaseCommand::CompleteCase { case_instance_id }
            | CaseCommand::SetCaseName {
                case_instance_id, ..
            }
            | CaseCommand::SetBusinessStatus {
                case_instance_id, ..
            }
            | CaseCommand::SetVariables {
                case_instance_id, ..
            }
            | CaseCommand::EvaluateCompletable {
                case_instance_id, ..
            } => bind(case_instance_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseCommandEnvelope {
    pub schema: String,
    pub id: String,
    pub command: CaseCommand,
}

impl CaseCommandEnvelope {
    pub fn new(id: impl Into<String>, command: CaseCommand) -> Self {
        Self {
            schema: CASE_COMMAND_SCHEMA_0_0_1.to_string(),
            id: id.into(),
            command,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateCommandMode {
    #[default]
    AcceptNoop,
    Reject,
}

/// Where a command id stands when an envelope arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAdmission {
    Fresh,
    /// Applied by an earlier envelope.
    Seen,
    /// Another envelope with this id is still running.
    InFlight,
}

#[derive(Debug, Clone)]
pub struct CommandDeduper {
    seen_command_ids: BTreeSet<String>,
    in_flight_command_ids: BTreeSet<String>,
    duplicate_mode: DuplicateCommandMode,
}

impl CommandDeduper {
    pub fn new(duplicate_mode: DuplicateCommandMode) -> Self {
        Self::with_seen_ids(duplicate_mode, Vec::new())
    }

    pub fn with_seen_ids(
        duplicate_mode: DuplicateCommandMode,
        seen_command_ids: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            seen_command_ids: seen_command_ids.into_iter().collect(),
            in_flight_command_ids: BTreeSet::new(),
            duplicate_mode,
        }
    }

    pub fn duplicate_mode(&self) -> DuplicateCommandMode {
        self.duplicate_mode
    }

    pub fn is_duplicate(&self, command_id: &str) -> bool {
        self.seen_command_ids.contains(command_id)
    }

    /// Remembers an id applied elsewhere, e.g. restored from a checkpoint. Returns `false` when it
    /// was already known.
    pub fn mark_seen(&mut self, command_id: impl Into<String>) -> bool {
        self.seen_command_ids.insert(command_id.into())
    }

    /// Reserves `command_id` for one running envelope. Only a `Fresh` admission holds the
    /// reservation, and it must be released with [`CommandDeduper::finish`].
    pub fn begin(&mut self, command_id: &str) -> CommandAdmission {
        if self.seen_command_ids.contains(command_id) {
            return CommandAdmission::Seen;
        }
        if !self.in_flight_command_ids.insert(command_id.to_string()) {
            return CommandAdmission::InFlight;
        }
        CommandAdmission::Fresh
    }

    /// Releases the reservation. Applied ids become seen, failed ids can be submitted again.
    pub fn finish(&mut self, command_id: &str, applied: bool) {
        self.in_flight_command_ids.remove(command_id);
        if applied {
            self.seen_command_ids.insert(command_id.to_string());
        }
    }

    /// Applied ids only; reservations still running are not reported.
    pub fn seen_command_ids(&self) -> Vec<String> {
        self.seen_command_ids.iter().cloned().collect()
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
