use super::{at_most_one, QueryError};
use crate::history::InMemoryHistory;
use crate::model::{CaseInstance, CaseState, MilestoneInstance};
use crate::store::CaseStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseInstanceQuery {
    pub case_instance_id: Option<String>,
    pub definition_key: Option<String>,
    pub business_key: Option<String>,
    pub business_status: Option<String>,
    pub callback_id: Option<String>,
    pub callback_type: Option<String>,
}

impl CaseInstanceQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn case_instance_id(mut self, id: impl Into<String>) -> Self {
        self.case_instance_id = Some(id.into());
        self
    }

    pub fn definition_key(mut self, key: impl Into<String>) -> Self {
        self.definition_key = Some(key.into());
        self
    }

    pub fn business_key(mut self, key: impl Into<String>) -> Self {
        self.business_key = Some(key.into());
        self
    }

    pub fn business_status(mut self, status: impl Into<String>) -> Self {
        self.business_status = Some(status.into());
        self
    }

    pub fn callback_id(mut self, id: impl Into<String>) -> Self {
        self.callback_id = Some(id.into());
        self
    }

    pub fn callback_type(mut self, callback_type: impl Into<String>) -> Self {
        self.callback_type = Some(callback_type.into());
        self
    }

    pub fn matches(&self, case: &CaseInstance) -> bool {
        matches_field(&self.case_instance_id, Some(&case.id))
            && matches_field(&self.definition_key, Some(&case.definition_key))
            && matches_field(&self.business_key, case.business_key.as_ref())
            && matches_field(&self.business_status, case.business_status.as_ref())
            && matches_field(&self.callback_id, case.callback_id.as_ref())
            && matches_field(&self.callback_type, case.callback_type.as_ref())
    }

    pub fn list(&self, store: &dyn CaseStore) -> Result<Vec<CaseInstance>, QueryError> {
        Ok(store
            .list()?
            .into_iter()
            .filter(|case| self.matches(case))
            .collect())
    }

    pub fn single(&self, store: &dyn CaseStore) -> Result<Option<CaseInstance>, QueryError> {
        at_most_one("case instance", self.list(store)?)
    }

    pub fn count(&self, store: &dyn CaseStore) -> Result<usize, QueryError> {
        Ok(self.list(store)?.len())
    }
}

/// Filter over ended cases kept by the history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoricCaseInstanceQuery {
    pub case: CaseInstanceQuery,
    pub state: Option<CaseState>,
}

impl HistoricCaseInstanceQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn case_instance_id(mut self, id: impl Into<String>) -> Self {
        self.case = self.case.case_instance_id(id);
        self
    }

    pub fn definition_key(mut self, key: impl Into<String>) -> Self {
        self.case = self.case.definition_key(key);
        self
    }

    pub fn state(mut self, state: CaseState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn list(&self, history: &InMemoryHistory) -> Vec<CaseInstance> {
        history
            .ended_cases()
            .into_iter()
            .filter(|case| self.case.matches(case))
            .filter(|case| self.state.map_or(true, |state| case.state == state))
            .collect()
    }

    pub fn single(&self, history: &InMemoryHistory) -> Result<Option<CaseInstance>, QueryError> {
        at_most_one("historic case instance", self.list(history))
    }

    pub fn count(&self, history: &InMemoryHistory) -> usize {
        self.list(history).len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MilestoneInstanceQuery {
    pub case_instance_id: Option<String>,
    pub name: Option<String>,
}

impl MilestoneInstanceQuery {
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

    /// Milestones of running cases, followed by those of ended cases when `history` is given.
    pub fn list(
        &self,
        store: &dyn CaseStore,
        history: Option<&InMemoryHistory>,
    ) -> Result<Vec<MilestoneInstance>, QueryError> {
        let mut cases = store.list()?;
        if let Some(history) = history {
            cases.extend(history.ended_cases());
        }
        Ok(cases
            .into_iter()
            .filter(|case| matches_field(&self.case_instance_id, Some(&case.id)))
            .flat_map(|case| case.milestones)
            .filter(|milestone| matches_field(&self.name, Some(&milestone.name)))
            .collect())
    }
}

fn matches_field(expected: &Option<String>, actual: Option<&String>) -> bool {
    match expected {
        Some(expected) => actual == Some(expected),
        None => true,
    }
}

#[cfg(test)]
#[path = "case_query_test.rs"]
mod tests;
