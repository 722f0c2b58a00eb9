use super::{
    decode_case_definition_json, CaseDefinition, ListenerAction, PlanItemKind, SentryKind,
    CASE_DEFINITION_SCHEMA_0_0_1,
};
use crate::PlanItemState;
use serde_json::json;

#[test]
fn definition_decodes_from_yaml_with_defaults() {
    let definition: CaseDefinition = serde_yaml::from_str(
        r#"
key: claims
plan_model:
  id: planModel
  kind: stage
  children:
    - id: review
      name: Review claim
      kind: human_task
      required: true
    - id: approved
      kind: milestone
      entry_criteria:
        - id: entry-approved
          on_parts:
            - source: review
              state: completed
          if_part:
            condition: "${approved}"
      listeners:
        - target_state: completed
          action:
            type: set_variables
            variables:
              payout: true
"#,
    )
    .expect("yaml must decode");

    assert_eq!(definition.schema, CASE_DEFINITION_SCHEMA_0_0_1);
    let review = &definition.plan_model.children[0];
    assert_eq!(review.display_name(), "Review claim");
    assert!(review.required);
    assert!(!review.manual_activation);

    let approved = &definition.plan_model.children[1];
    assert_eq!(approved.display_name(), "approved");
    assert_eq!(approved.sentries(SentryKind::Entry).len(), 1);
    assert!(approved.sentries(SentryKind::Exit).is_empty());
    assert_eq!(
        approved.entry_criteria[0].on_parts[0].state,
        PlanItemState::Completed
    );
    assert!(approved.listeners[0].matches(PlanItemState::Available, PlanItemState::Completed));
    assert!(!approved.listeners[0].matches(PlanItemState::Available, PlanItemState::Active));
    assert_eq!(
        approved.listeners[0].action,
        ListenerAction::SetVariables {
            variables: serde_json::Map::from_iter([("payout".to_string(), json!(true))])
        }
    );
}

#[test]
fn unknown_fields_are_rejected() {
    let error = decode_case_definition_json(
        r#"{"key":"x","plan_model":{"id":"p","kind":"stage","repetition":true}}"#,
    )
    .expect_err("unknown field must fail");
    assert!(error.to_string().contains("repetition"));
}

#[test]
fn kind_helpers_partition_plan_items() {
    assert!(PlanItemKind::Milestone.occurs_instantly());
    assert!(!PlanItemKind::Milestone.waits_for_occurrence());
    assert!(PlanItemKind::TimerEventListener.waits_for_occurrence());
    assert!(!PlanItemKind::HumanTask.occurs_instantly());
    assert!(PlanItemKind::Stage.is_stage());
}
