use crate::commands::CaseCommand;
use crate::completion::CompletionScope;
use case_core::{PlanItemState, PlanItemTransition};

/// Who asked for a transition. Command transitions are validated strictly; sentry and engine
/// transitions that went stale before they ran are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOrigin {
    Command,
    Sentry,
    Engine,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    CreateChildren {
        scope: CompletionScope,
    },
    InitializePlanItem {
        plan_item_instance_id: String,
    },
    FinishChildMaterialization {
        scope: CompletionScope,
    },
    Transition {
        plan_item_instance_id: String,
        transition: PlanItemTransition,
        origin: TransitionOrigin,
    },
    EvaluateSentries {
        source_definition_id: String,
        source_instance_id: String,
        state: PlanItemState,
    },
    EvaluateConditionSentries,
    EvaluateCompletion {
        scope: CompletionScope,
    },
    ForceCompletable {
        scope: CompletionScope,
    },
    CompleteCase,
    TerminateCase,
    ApplyListenerCommand(CaseCommand),
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::CreateChildren { .. } => "create_children",
            Operation::InitializePlanItem { .. } => "initialize_plan_item",
            Operation::FinishChildMaterialization { .. } => "finish_child_materialization",
            Operation::Transition { .. } => "transition",
            Operation::EvaluateSentries { .. } => "evaluate_sentries",
            Operation::EvaluateConditionSentries => "evaluate_condition_sentries",
            Operation::EvaluateCompletion { .. } => "evaluate_completion",
            Operation::ForceCompletable { .. } => "force_completable",
            Operation::CompleteCase => "complete_case",
            Operation::TerminateCase => "terminate_case",
            Operation::ApplyListenerCommand(_) => "apply_listener_command",
        }
    }
}
