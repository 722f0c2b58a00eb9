use crate::context::HistorySink;
use crate::events::CaseEventRecord;
use crate::model::CaseInstance;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct HistoryState {
    events: Vec<CaseEventRecord>,
    ended_cases: BTreeMap<String, CaseInstance>,
}

/// History sink keeping committed events and ended cases in memory.
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    state: Mutex<HistoryState>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HistoryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn events(&self) -> Vec<CaseEventRecord> {
        self.lock().events.clone()
    }

    pub fn events_for(&self, case_instance_id: &str) -> Vec<CaseEventRecord> {
        self.lock()
            .events
            .iter()
            .filter(|record| record.case_instance_id == case_instance_id)
            .cloned()
            .collect()
    }

    pub fn ended_cases(&self) -> Vec<CaseInstance> {
        self.lock().ended_cases.values().cloned().collect()
    }

    pub fn ended_case(&self, case_instance_id: &str) -> Option<CaseInstance> {
        self.lock().ended_cases.get(case_instance_id).cloned()
    }
}

impl HistorySink for InMemoryHistory {
    fn record_events(&self, records: &[CaseEventRecord]) {
        self.lock().events.extend(records.iter().cloned());
    }

    fn record_case_ended(&self, case: &CaseInstance) {
        self.lock().ended_cases.insert(case.id.clone(), case.clone());
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
