use super::{
    compute_completion, mark_ancestors_dirty, read_completable, refresh_completable,
    CompletionScope,
};
use crate::test_support::{empty_case, graph_from_json, plan_item};
use case_core::{PlanItemKind, PlanItemState};
use serde_json::json;

fn graph() -> case_core::DefinitionGraph {
    graph_from_json(json!({
        "key": "completion",
        "plan_model": {
            "id": "root",
            "kind": "stage",
            "children": [
                {
                    "id": "stage",
                    "kind": "stage",
                    "children": [
                        {"id": "required_task", "kind": "human_task", "required": true},
                        {"id": "optional_task", "kind": "human_task"}
                    ]
                }
            ]
        }
    }))
}

#[test]
fn required_and_active_children_block_completion() {
    let graph = graph();
    let mut case = empty_case("case-1");
    plan_item(&mut case, "stage", PlanItemKind::Stage, PlanItemState::Active, None);
    plan_item(&mut case, "required_task", PlanItemKind::HumanTask, PlanItemState::Enabled, Some("stage"));
    plan_item(&mut case, "optional_task", PlanItemKind::HumanTask, PlanItemState::Available, Some("stage"));
    let scope = CompletionScope::Stage("stage".to_string());

    let status = compute_completion(&case, &graph, &scope);
    assert!(!status.completable);

    if let Some(item) = case.plan_item_mut("required_task") {
        item.state = PlanItemState::Completed;
    }
    let status = compute_completion(&case, &graph, &scope);
    assert!(status.completable);
    assert!(!status.all_children_terminal);
    assert!(!status.should_auto_complete(false));
    assert!(status.should_auto_complete(true));

    if let Some(item) = case.plan_item_mut("optional_task") {
        item.state = PlanItemState::Active;
    }
    assert!(!compute_completion(&case, &graph, &scope).completable);
}

#[test]
fn dirty_reads_do_not_touch_the_cache() {
    let graph = graph();
    let mut case = empty_case("case-1");
    plan_item(&mut case, "stage", PlanItemKind::Stage, PlanItemState::Active, None);
    plan_item(&mut case, "required_task", PlanItemKind::HumanTask, PlanItemState::Completed, Some("stage"));
    let scope = CompletionScope::Stage("stage".to_string());

    let before = case.clone();
    assert_eq!(read_completable(&case, &graph, &scope), Some(true));
    assert_eq!(read_completable(&case, &graph, &scope), Some(true));
    assert_eq!(case, before);

    let status = refresh_completable(&mut case, &graph, &scope).expect("stage exists");
    assert!(status.completable);
    let stage = case.plan_item("stage").expect("stage");
    assert!(stage.completable);
    assert!(!stage.completable_dirty);
}

#[test]
fn dirty_marks_reach_every_ancestor_and_the_root() {
    let mut case = empty_case("case-1");
    plan_item(&mut case, "stage", PlanItemKind::Stage, PlanItemState::Active, None);
    plan_item(&mut case, "required_task", PlanItemKind::HumanTask, PlanItemState::Active, Some("stage"));
    if let Some(stage) = case.plan_item_mut("stage") {
        stage.completable_dirty = false;
    }
    case.completable_dirty = false;

    mark_ancestors_dirty(&mut case, "required_task");
    assert!(case.completable_dirty);
    assert!(case.plan_item("stage").is_some_and(|stage| stage.completable_dirty));
}

#[test]
fn unknown_stage_reads_nothing() {
    let graph = graph();
    let case = empty_case("case-1");
    assert_eq!(
        read_completable(&case, &graph, &CompletionScope::Stage("missing".to_string())),
        None
    );
    assert_eq!(read_completable(&case, &graph, &CompletionScope::CaseRoot), Some(true));
}
