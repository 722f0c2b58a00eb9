use crate::model::{CaseInstance, PlanItemInstance};
use case_core::{DefinitionGraph, PlanItemState};
use serde::{Deserialize, Serialize};

/// A stage instance, or the case plan model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum CompletionScope {
    CaseRoot,
    Stage(String),
}

impl CompletionScope {
    pub fn parent_of(item: &PlanItemInstance) -> Self {
        match &item.parent_id {
            Some(parent_id) => CompletionScope::Stage(parent_id.clone()),
            None => CompletionScope::CaseRoot,
        }
    }

    pub fn parent_id(&self) -> Option<&str> {
        match self {
            CompletionScope::CaseRoot => None,
            CompletionScope::Stage(id) => Some(id.as_str()),
        }
    }

    pub fn label(&self) -> &str {
        self.parent_id().unwrap_or("case")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionStatus {
    pub completable: bool,
    pub all_children_terminal: bool,
}

impl CompletionStatus {
    pub fn should_auto_complete(self, auto_complete: bool) -> bool {
        self.completable && (auto_complete || self.all_children_terminal)
    }
}

/// Derives completion status from the children alone: completable when no child is active and
/// every required child is terminal.
pub fn compute_completion(
    case: &CaseInstance,
    graph: &DefinitionGraph,
    scope: &CompletionScope,
) -> CompletionStatus {
    let mut completable = true;
    let mut all_children_terminal = true;
    for child in case.children_of(scope.parent_id()) {
        let terminal = child.is_terminal();
        all_children_terminal &= terminal;
        if child.state == PlanItemState::Active {
            completable = false;
        }
        let required = graph
            .get(&child.definition_id)
            .is_some_and(|definition| definition.required);
        if required && !terminal {
            completable = false;
        }
    }
    CompletionStatus {
        completable,
        all_children_terminal,
    }
}

/// Side-effect free read: returns the cache when clean, a fresh computation when dirty.
/// `None` when the stage does not exist.
pub fn read_completable(
    case: &CaseInstance,
    graph: &DefinitionGraph,
    scope: &CompletionScope,
) -> Option<bool> {
    let (cached, dirty) = cache_of(case, scope)?;
    if dirty {
        Some(compute_completion(case, graph, scope).completable)
    } else {
        Some(cached)
    }
}

/// Recomputes and stores the completable cache, clearing the dirty bit.
pub fn refresh_completable(
    case: &mut CaseInstance,
    graph: &DefinitionGraph,
    scope: &CompletionScope,
) -> Option<CompletionStatus> {
    cache_of(case, scope)?;
    let status = compute_completion(case, graph, scope);
    match scope {
        CompletionScope::CaseRoot => {
            case.completable = status.completable;
            case.completable_dirty = false;
        }
        CompletionScope::Stage(id) => {
            let stage = case.plan_item_mut(id)?;
            stage.completable = status.completable;
            stage.completable_dirty = false;
        }
    }
    Some(status)
}

/// Marks the completable cache of every enclosing stage of `plan_item_instance_id` and of the
/// case root as dirty.
pub fn mark_ancestors_dirty(case: &mut CaseInstance, plan_item_instance_id: &str) {
    for ancestor in case.ancestors_of(plan_item_instance_id) {
        if let Some(stage) = case.plan_item_mut(&ancestor) {
            stage.completable_dirty = true;
        }
    }
    case.completable_dirty = true;
}

pub fn mark_dirty(case: &mut CaseInstance, scope: &CompletionScope) {
    match scope {
        CompletionScope::CaseRoot => case.completable_dirty = true,
        CompletionScope::Stage(id) => {
            if let Some(stage) = case.plan_item_mut(id) {
                stage.completable_dirty = true;
            }
        }
    }
}

pub fn state_change_unprocessed(case: &CaseInstance, scope: &CompletionScope) -> bool {
    match scope {
        CompletionScope::CaseRoot => case.state_change_unprocessed,
        CompletionScope::Stage(id) => case
            .plan_item(id)
            .is_some_and(|stage| stage.state_change_unprocessed),
    }
}

pub fn set_state_change_unprocessed(case: &mut CaseInstance, scope: &CompletionScope, value: bool) {
    match scope {
        CompletionScope::CaseRoot => case.state_change_unprocessed = value,
        CompletionScope::Stage(id) => {
            if let Some(stage) = case.plan_item_mut(id) {
                stage.state_change_unprocessed = value;
            }
        }
    }
}

/// Whether the scope is still running and may complete.
pub fn scope_is_active(case: &CaseInstance, scope: &CompletionScope) -> bool {
    match scope {
        CompletionScope::CaseRoot => case.is_active(),
        CompletionScope::Stage(id) => {
            case.is_active()
                && case
                    .plan_item(id)
                    .is_some_and(|stage| stage.is_stage() && stage.state == PlanItemState::Active)
        }
    }
}

fn cache_of(case: &CaseInstance, scope: &CompletionScope) -> Option<(bool, bool)> {
    match scope {
        CompletionScope::CaseRoot => Some((case.completable, case.completable_dirty)),
        CompletionScope::Stage(id) => {
            let stage = case.plan_item(id).filter(|item| item.is_stage())?;
            Some((stage.completable, stage.completable_dirty))
        }
    }
}

#[cfg(test)]
#[path = "evaluator_test.rs"]
mod tests;
