use super::{at_most_one, QueryError};
use crate::model::PlanItemInstance;
use crate::store::CaseStore;
use case_core::{PlanItemKind, PlanItemState};

/// Filter over the plan item instances of running cases. Ended items (completed, terminated,
/// unavailable) are left out unless `include_ended` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanItemInstanceQuery {
    pub case_instance_id: Option<String>,
    pub name: Option<String>,
    pub state: Option<PlanItemState>,
    pub definition_id: Option<String>,
    pub kind: Option<PlanItemKind>,
    pub include_ended: bool,
}

impl PlanItemInstanceQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn case_instance_id(mut self, id: impl Into<String>) -> Self {
        self.case_instance_id = Some(id.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn state(mut self, state: PlanItemState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn definition_id(mut self, id: impl Into<String>) -> Self {
        self.definition_id = Some(id.into());
        self
    }

    pub fn kind(mut self, kind: PlanItemKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn include_ended(mut self) -> Self {
        self.include_ended = true;
        self
    }

    pub fn matches(&self, item: &PlanItemInstance) -> bool {
        let state_ok = match self.state {
            Some(state) => item.state == state,
            None => self.include_ended || !item.is_terminal(),
        };
        state_ok
            && self.name.as_ref().map_or(true, |name| &item.name == name)
            && self
                .definition_id
                .as_ref()
                .map_or(true, |id| &item.definition_id == id)
            && self.kind.map_or(true, |kind| item.kind == kind)
    }

    /// Matching items ordered by case id, then creation order.
    pub fn list(&self, store: &dyn CaseStore) -> Result<Vec<PlanItemInstance>, QueryError> {
        let cases = match self.case_instance_id.as_deref() {
            Some(id) => store.load(id)?.into_iter().collect::<Vec<_>>(),
            None => store.list()?,
        };
        let mut items = cases
            .into_iter()
            .flat_map(|case| case.plan_items.into_values())
            .filter(|item| self.matches(item))
            .collect::<Vec<_>>();
        items.sort_by(|left, right| {
            left.case_instance_id
                .cmp(&right.case_instance_id)
                .then(left.seq.cmp(&right.seq))
        });
        Ok(items)
    }

    pub fn single(&self, store: &dyn CaseStore) -> Result<Option<PlanItemInstance>, QueryError> {
        at_most_one("plan item instance", self.list(store)?)
    }

    pub fn count(&self, store: &dyn CaseStore) -> Result<usize, QueryError> {
        Ok(self.list(store)?.len())
    }
}

#[cfg(test)]
#[path = "plan_item_query_test.rs"]
mod tests;
