use super::{CaseInstanceQuery, HistoricCaseInstanceQuery, MilestoneInstanceQuery};
use crate::context::HistorySink;
use crate::history::InMemoryHistory;
use crate::model::{record_milestone, CaseState};
use crate::query::QueryError;
use crate::store::{CaseStore, InMemoryCaseStore};
use crate::test_support::{empty_case, fixed_time, plan_item};
use case_core::{PlanItemKind, PlanItemState};

#[test]
fn case_filters_match_business_and_callback_fields() {
    let store = InMemoryCaseStore::new();
    let mut first = empty_case("case-1");
    first.business_key = Some("order-1".to_string());
    first.callback_type = Some("parent-case".to_string());
    first.callback_id = Some("parent-1".to_string());
    store.insert(first).expect("insert");
    let mut second = empty_case("case-2");
    second.business_status = Some("escalated".to_string());
    second.callback_type = Some("parent-case".to_string());
    store.insert(second).expect("insert");

    assert_eq!(
        CaseInstanceQuery::new().callback_type("parent-case").count(&store),
        Ok(2)
    );
    assert_eq!(
        CaseInstanceQuery::new()
            .callback_type("parent-case")
            .callback_id("parent-1")
            .single(&store)
            .expect("query")
            .map(|case| case.id),
        Some("case-1".to_string())
    );
    assert_eq!(
        CaseInstanceQuery::new().business_status("escalated").count(&store),
        Ok(1)
    );
    assert_eq!(CaseInstanceQuery::new().business_key("order-1").count(&store), Ok(1));
    assert!(matches!(
        CaseInstanceQuery::new().definition_key("test-case").single(&store),
        Err(QueryError::AmbiguousResult { count: 2, .. })
    ));
}

#[test]
fn historic_and_milestone_queries_read_ended_cases() {
    let store = InMemoryCaseStore::new();
    let history = InMemoryHistory::new();
    let mut ended = empty_case("case-1");
    let milestone = plan_item(&mut ended, "m1", PlanItemKind::Milestone, PlanItemState::Completed, None);
    record_milestone(&mut ended, &milestone, fixed_time());
    ended.state = CaseState::Completed;
    history.record_case_ended(&ended);

    assert_eq!(
        HistoricCaseInstanceQuery::new()
            .state(CaseState::Completed)
            .count(&history),
        1
    );
    assert_eq!(
        HistoricCaseInstanceQuery::new()
            .state(CaseState::Terminated)
            .count(&history),
        0
    );
    assert!(MilestoneInstanceQuery::new()
        .list(&store, None)
        .expect("query")
        .is_empty());
    let milestones = MilestoneInstanceQuery::new()
        .name("m1")
        .list(&store, Some(&history))
        .expect("query");
    assert_eq!(milestones.len(), 1);
    assert_eq!(milestones[0].case_instance_id, "case-1");
}
