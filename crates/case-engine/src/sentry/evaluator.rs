use crate::context::ConditionEvaluator;
use crate::error::EngineError;
use crate::model::{CaseInstance, SentryMarks};
use case_core::{DefinitionGraph, PlanItemState, Sentry, SentryKind};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SentryTarget {
    CaseRoot,
    PlanItem(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentryFiring {
    pub target: SentryTarget,
    pub target_definition_id: String,
    pub kind: SentryKind,
    pub sentry_id: String,
}

/// Arms the on-parts that listen to `source_definition_id` reaching `state` and returns the
/// sentries that became satisfied. Marks of fired sentries are consumed; nothing else is applied.
///
/// Targets are visited in document order with exit sentries first. A target whose exit sentry
/// fired is not entered by the same event.
pub fn evaluate_on_part_event(
    case: &mut CaseInstance,
    graph: &DefinitionGraph,
    evaluator: &dyn ConditionEvaluator,
    source_definition_id: &str,
    state: PlanItemState,
) -> Result<Vec<SentryFiring>, EngineError> {
    let mut firings = Vec::new();
    let mut exited = BTreeSet::<SentryTarget>::new();

    for sentry_ref in graph.sentries_listening_to(source_definition_id, state) {
        let Some(definition) = graph.get(&sentry_ref.target) else {
            continue;
        };
        let Some(sentry) = definition.sentries(sentry_ref.kind).get(sentry_ref.sentry_index) else {
            continue;
        };

        for target in live_targets(case, graph, &sentry_ref.target, sentry_ref.kind) {
            if sentry_ref.kind == SentryKind::Entry && exited.contains(&target) {
                continue;
            }
            let Some(marks) = marks_mut(case, &target) else {
                continue;
            };
            marks.arm(sentry_ref.kind, sentry_ref.sentry_index, &sentry_ref.on_part_indexes);
            if marks.armed_count(sentry_ref.kind, sentry_ref.sentry_index) < sentry.on_parts.len() {
                continue;
            }
            if !if_part_holds(sentry, &case.variables, evaluator)? {
                debug!(
                    sentry = %sentry.id,
                    target = %sentry_ref.target,
                    "sentry on-parts complete but if-part is false"
                );
                continue;
            }
            if let Some(marks) = marks_mut(case, &target) {
                marks.consume(sentry_ref.kind, sentry_ref.sentry_index);
            }
            if sentry_ref.kind == SentryKind::Exit {
                exited.insert(target.clone());
            }
            firings.push(SentryFiring {
                target,
                target_definition_id: sentry_ref.target.clone(),
                kind: sentry_ref.kind,
                sentry_id: sentry.id.clone(),
            });
        }
    }

    Ok(firings)
}

/// Re-checks sentries whose on-parts are all armed, including sentries made of an if-part only.
/// Used after variable changes (`only = None`) and when a single plan item is initialized.
pub fn evaluate_armed_sentries(
    case: &mut CaseInstance,
    graph: &DefinitionGraph,
    evaluator: &dyn ConditionEvaluator,
    only: Option<&str>,
) -> Result<Vec<SentryFiring>, EngineError> {
    let mut targets = Vec::<(usize, u64, SentryTarget, String)>::new();
    match only {
        Some(id) => {
            if let Some(item) = case.plan_item(id) {
                targets.push((0, item.seq, SentryTarget::PlanItem(id.to_string()), item.definition_id.clone()));
            }
        }
        None => {
            if case.is_active() {
                targets.push((0, 0, SentryTarget::CaseRoot, graph.root().id.clone()));
            }
            for item in case.plan_items.values().filter(|item| !item.is_terminal()) {
                targets.push((
                    graph.document_order(&item.definition_id),
                    item.seq,
                    SentryTarget::PlanItem(item.id.clone()),
                    item.definition_id.clone(),
                ));
            }
            targets.sort();
        }
    }

    let mut firings = Vec::new();
    for (_, _, target, definition_id) in targets {
        let Some(definition) = graph.get(&definition_id) else {
            continue;
        };
        let mut exited = false;
        for kind in [SentryKind::Exit, SentryKind::Entry] {
            if kind == SentryKind::Entry && (exited || !accepts_entry(case, &target)) {
                continue;
            }
            for (sentry_index, sentry) in definition.sentries(kind).iter().enumerate() {
                let armed = marks(case, &target).map_or(0, |marks| marks.armed_count(kind, sentry_index));
                if armed < sentry.on_parts.len() || sentry.if_part.is_none() {
                    continue;
                }
                if !if_part_holds(sentry, &case.variables, evaluator)? {
                    continue;
                }
                if let Some(marks) = marks_mut(case, &target) {
                    marks.consume(kind, sentry_index);
                }
                firings.push(SentryFiring {
                    target: target.clone(),
                    target_definition_id: definition_id.clone(),
                    kind,
                    sentry_id: sentry.id.clone(),
                });
                if kind == SentryKind::Exit {
                    exited = true;
                }
                break;
            }
        }
    }
    Ok(firings)
}

fn live_targets(
    case: &CaseInstance,
    graph: &DefinitionGraph,
    target_definition_id: &str,
    kind: SentryKind,
) -> Vec<SentryTarget> {
    if graph.is_root(target_definition_id) {
        return match (kind, case.is_active()) {
            (SentryKind::Exit, true) => vec![SentryTarget::CaseRoot],
            _ => Vec::new(),
        };
    }
    let mut instances = case
        .instances_of(target_definition_id)
        .filter(|item| match kind {
            SentryKind::Entry => item.state == PlanItemState::Available,
            SentryKind::Exit => !item.is_terminal(),
        })
        .collect::<Vec<_>>();
    instances.sort_by_key(|item| item.seq);
    instances
        .into_iter()
        .map(|item| SentryTarget::PlanItem(item.id.clone()))
        .collect()
}

fn accepts_entry(case: &CaseInstance, target: &SentryTarget) -> bool {
    match target {
        SentryTarget::CaseRoot => false,
        SentryTarget::PlanItem(id) => case
            .plan_item(id)
            .is_some_and(|item| item.state == PlanItemState::Available),
    }
}

fn marks<'a>(case: &'a CaseInstance, target: &SentryTarget) -> Option<&'a SentryMarks> {
    match target {
        SentryTarget::CaseRoot => Some(&case.root_sentry_marks),
        SentryTarget::PlanItem(id) => case.plan_item(id).map(|item| &item.sentry_marks),
    }
}

fn marks_mut<'a>(case: &'a mut CaseInstance, target: &SentryTarget) -> Option<&'a mut SentryMarks> {
    match target {
        SentryTarget::CaseRoot => Some(&mut case.root_sentry_marks),
        SentryTarget::PlanItem(id) => case.plan_item_mut(id).map(|item| &mut item.sentry_marks),
    }
}

fn if_part_holds(
    sentry: &Sentry,
    variables: &Map<String, Value>,
    evaluator: &dyn ConditionEvaluator,
) -> Result<bool, EngineError> {
    let Some(if_part) = sentry.if_part.as_ref() else {
        return Ok(true);
    };
    evaluator
        .evaluate(&if_part.condition, variables)
        .map_err(|reason| EngineError::EvaluationFailure {
            condition: if_part.condition.clone(),
            reason,
        })
}

#[cfg(test)]
#[path = "evaluator_test.rs"]
mod tests;
