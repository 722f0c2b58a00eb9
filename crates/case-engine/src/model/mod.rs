mod case;
mod milestone;
mod plan_item;

pub use case::{CaseInstance, CaseState, TimerJob};
pub use milestone::{record_milestone, MilestoneInstance};
pub use plan_item::{ArmedSentry, PlanItemInstance, SentryMarks};
