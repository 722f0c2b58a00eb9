use crate::definition::{
    CaseDefinition, ListenerAction, PlanItemDefinition, PlanItemKind, SentryKind,
    CASE_DEFINITION_SCHEMA_0_0_1,
};
use crate::field_path::FieldPath;
use crate::issues::{IssueSeverity, StructuredIssue};
use std::collections::{BTreeMap, BTreeSet};

pub fn validate_case_definition(definition: &CaseDefinition) -> Vec<StructuredIssue> {
    let mut issues = Vec::<StructuredIssue>::new();
    let root_path = FieldPath::root();

    if definition.schema != CASE_DEFINITION_SCHEMA_0_0_1 {
        issues.push(StructuredIssue::error(
            "definition.schema",
            None,
            root_path.key("schema"),
            format!(
                "unsupported definition schema `{}` (expected `{CASE_DEFINITION_SCHEMA_0_0_1}`)",
                definition.schema
            ),
        ));
    }
    if definition.key.trim().is_empty() {
        issues.push(StructuredIssue::error(
            "definition.key.empty",
            None,
            root_path.key("key"),
            "definition key must not be empty",
        ));
    }

    let plan_model = &definition.plan_model;
    let plan_model_path = root_path.key("plan_model");
    if plan_model.kind != PlanItemKind::Stage {
        issues.push(StructuredIssue::error(
            "definition.plan_model.kind",
            Some(plan_model.id.as_str()),
            plan_model_path.key("kind"),
            "plan model must be a stage",
        ));
    }
    if !plan_model.entry_criteria.is_empty() {
        issues.push(StructuredIssue::error(
            "definition.plan_model.entry_criteria",
            Some(plan_model.id.as_str()),
            plan_model_path.key("entry_criteria"),
            "plan model cannot declare entry criteria",
        ));
    }

    let mut known_ids = BTreeMap::<String, FieldPath>::new();
    collect_ids(plan_model, &plan_model_path, &mut known_ids, &mut issues);

    let mut sentry_ids = BTreeSet::<String>::new();
    check_item(plan_model, &plan_model_path, &known_ids, &mut sentry_ids, &mut issues);

    StructuredIssue::sort_stable(&mut issues);
    issues
}

fn collect_ids(
    item: &PlanItemDefinition,
    path: &FieldPath,
    known_ids: &mut BTreeMap<String, FieldPath>,
    issues: &mut Vec<StructuredIssue>,
) {
    if item.id.trim().is_empty() {
        issues.push(StructuredIssue::error(
            "definition.plan_item.id.empty",
            None,
            path.key("id"),
            "plan item id must not be empty",
        ));
    } else if let Some(first) = known_ids.get(&item.id) {
        issues.push(StructuredIssue::error(
            "definition.plan_item.id.duplicate",
            Some(item.id.as_str()),
            path.key("id"),
            format!("plan item id `{}` is already declared at {first}", item.id),
        ));
    } else {
        known_ids.insert(item.id.clone(), path.clone());
    }
    for (index, child) in item.children.iter().enumerate() {
        collect_ids(child, &path.key("children").index(index), known_ids, issues);
    }
}

fn check_item(
    item: &PlanItemDefinition,
    path: &FieldPath,
    known_ids: &BTreeMap<String, FieldPath>,
    sentry_ids: &mut BTreeSet<String>,
    issues: &mut Vec<StructuredIssue>,
) {
    let item_id = Some(item.id.as_str());
    if !item.children.is_empty() && !item.kind.is_stage() {
        issues.push(StructuredIssue::error(
            "definition.plan_item.children",
            item_id,
            path.key("children"),
            format!("only stages may contain children, `{}` is a {}", item.id, item.kind.as_str()),
        ));
    }
    if item.kind == PlanItemKind::TimerEventListener
        && item
            .timer_expression
            .as_deref()
            .map_or(true, |expression| expression.trim().is_empty())
    {
        issues.push(StructuredIssue::error(
            "definition.timer.expression",
            item_id,
            path.key("timer_expression"),
            "timer event listener requires a timer expression",
        ));
    }
    if item.kind.waits_for_occurrence() && !item.entry_criteria.is_empty() {
        issues.push(StructuredIssue::error(
            "definition.event_listener.entry_criteria",
            item_id,
            path.key("entry_criteria"),
            format!("{} `{}` cannot declare entry criteria", item.kind.as_str(), item.id),
        ));
    }
    if item.kind.is_stage() && item.manual_activation {
        issues.push(StructuredIssue {
            kind: "definition.stage.manual_activation".to_string(),
            severity: IssueSeverity::Info,
            plan_item_id: Some(item.id.clone()),
            field_path: path.key("manual_activation"),
            message: "stage will wait in `enabled` until started manually".to_string(),
            related: None,
        });
    }

    for kind in [SentryKind::Entry, SentryKind::Exit] {
        let field = match kind {
            SentryKind::Entry => "entry_criteria",
            SentryKind::Exit => "exit_criteria",
        };
        for (sentry_index, sentry) in item.sentries(kind).iter().enumerate() {
            let sentry_path = path.key(field).index(sentry_index);
            if !sentry_ids.insert(sentry.id.clone()) {
                issues.push(StructuredIssue {
                    kind: "definition.sentry.id.duplicate".to_string(),
                    severity: IssueSeverity::Warning,
                    plan_item_id: Some(item.id.clone()),
                    field_path: sentry_path.key("id"),
                    message: format!("sentry id `{}` is declared more than once", sentry.id),
                    related: None,
                });
            }
            if sentry.on_parts.is_empty() && sentry.if_part.is_none() {
                issues.push(StructuredIssue::error(
                    "definition.sentry.empty",
                    item_id,
                    sentry_path.clone(),
                    format!("sentry `{}` needs at least one on-part or an if-part", sentry.id),
                ));
            }
            for (on_part_index, on_part) in sentry.on_parts.iter().enumerate() {
                if !known_ids.contains_key(&on_part.source) {
                    issues.push(StructuredIssue::error(
                        "definition.sentry.unknown_source",
                        item_id,
                        sentry_path.key("on_parts").index(on_part_index).key("source"),
                        format!("on-part references unknown plan item `{}`", on_part.source),
                    ));
                }
            }
            if let Some(if_part) = &sentry.if_part {
                if if_part.condition.trim().is_empty() {
                    issues.push(StructuredIssue::error(
                        "definition.sentry.if_part.empty",
                        item_id,
                        sentry_path.key("if_part").key("condition"),
                        "if-part condition must not be empty",
                    ));
                }
            }
        }
    }

    for (index, listener) in item.listeners.iter().enumerate() {
        if let ListenerAction::Delegate { name } = &listener.action {
            if name.trim().is_empty() {
                issues.push(StructuredIssue::error(
                    "definition.listener.delegate",
                    item_id,
                    path.key("listeners").index(index).key("action").key("name"),
                    "delegate listener requires a name",
                ));
            }
        }
    }

    for (index, child) in item.children.iter().enumerate() {
        check_item(child, &path.key("children").index(index), known_ids, sentry_ids, issues);
    }
}

#[cfg(test)]
#[path = "validate_test.rs"]
mod tests;
