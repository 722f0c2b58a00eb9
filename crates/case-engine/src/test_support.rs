use crate::model::{CaseInstance, PlanItemInstance, SentryMarks};
use case_core::{PlanItemKind, PlanItemState};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Map;

pub(crate) fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 13, 0, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(crate) fn empty_case(id: &str) -> CaseInstance {
    CaseInstance::new(id, "test-case", 1, "hash", fixed_time())
}

pub(crate) fn plan_item(
    case: &mut CaseInstance,
    id: &str,
    kind: PlanItemKind,
    state: PlanItemState,
    parent_id: Option<&str>,
) -> PlanItemInstance {
    let seq = case.next_plan_item_seq;
    case.next_plan_item_seq += 1;
    let item = PlanItemInstance {
        id: id.to_string(),
        case_instance_id: case.id.clone(),
        definition_id: id.to_string(),
        name: id.to_string(),
        kind,
        state,
        parent_id: parent_id.map(str::to_string),
        seq,
        state_change_unprocessed: false,
        completable: false,
        completable_dirty: true,
        sentry_marks: SentryMarks::default(),
        created_at: fixed_time(),
        last_transition_at: fixed_time(),
        ended_at: None,
    };
    case.plan_items.insert(item.id.clone(), item.clone());
    item
}

pub(crate) fn graph_from_json(value: serde_json::Value) -> case_core::DefinitionGraph {
    let definition: case_core::CaseDefinition =
        serde_json::from_value(value).expect("definition must decode");
    case_core::DefinitionGraph::new(definition)
}

/// Evaluator that fails every condition.
pub(crate) struct FailingEvaluator;

impl crate::context::ConditionEvaluator for FailingEvaluator {
    fn evaluate(
        &self,
        condition: &str,
        _variables: &Map<String, serde_json::Value>,
    ) -> Result<bool, String> {
        Err(format!("cannot evaluate {condition}"))
    }
}
