mod case_query;
mod plan_item_query;

pub use case_query::{CaseInstanceQuery, HistoricCaseInstanceQuery, MilestoneInstanceQuery};
pub use plan_item_query::PlanItemInstanceQuery;

use crate::store::CaseStoreError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("expected at most one {entity}, found {count}")]
    AmbiguousResult { entity: &'static str, count: usize },
    #[error(transparent)]
    Store(#[from] CaseStoreError),
}

pub(crate) fn at_most_one<T>(entity: &'static str, mut rows: Vec<T>) -> Result<Option<T>, QueryError> {
    match rows.len() {
        0 => Ok(None),
        1 => Ok(rows.pop()),
        count => Err(QueryError::AmbiguousResult { entity, count }),
    }
}
