use crate::model::case::CaseInstance;
use crate::model::plan_item::PlanItemInstance;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable fact: a milestone was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneInstance {
    pub id: String,
    pub case_instance_id: String,
    pub plan_item_instance_id: String,
    pub milestone_definition_id: String,
    pub name: String,
    pub achieved_at: DateTime<Utc>,
}

/// Records `milestone` on `case` unless it was recorded before. Returns the new fact.
pub fn record_milestone(
    case: &mut CaseInstance,
    milestone: &PlanItemInstance,
    achieved_at: DateTime<Utc>,
) -> Option<MilestoneInstance> {
    if case
        .milestones
        .iter()
        .any(|existing| existing.plan_item_instance_id == milestone.id)
    {
        return None;
    }
    let fact = MilestoneInstance {
        id: uuid::Uuid::new_v4().to_string(),
        case_instance_id: case.id.clone(),
        plan_item_instance_id: milestone.id.clone(),
        milestone_definition_id: milestone.definition_id.clone(),
        name: milestone.name.clone(),
        achieved_at,
    };
    case.milestones.push(fact.clone());
    Some(fact)
}

#[cfg(test)]
#[path = "milestone_test.rs"]
mod tests;
