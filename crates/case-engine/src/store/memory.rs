use super::{CaseStore, CaseStoreError};
use crate::model::CaseInstance;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
pub struct InMemoryCaseStore {
    cases: RwLock<BTreeMap<String, CaseInstance>>,
}

impl InMemoryCaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, CaseInstance>>, CaseStoreError> {
        self.cases.read().map_err(|_| CaseStoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, CaseInstance>>, CaseStoreError> {
        self.cases.write().map_err(|_| CaseStoreError::Poisoned)
    }
}

fn check_version(stored: &CaseInstance, expected_version: u64) -> Result<(), CaseStoreError> {
    if stored.version != expected_version {
        return Err(CaseStoreError::VersionConflict {
            case_instance_id: stored.id.clone(),
            expected: expected_version,
            actual: stored.version,
        });
    }
    Ok(())
}

impl CaseStore for InMemoryCaseStore {
    fn insert(&self, mut case: CaseInstance) -> Result<u64, CaseStoreError> {
        let mut cases = self.write()?;
        if cases.contains_key(&case.id) {
            return Err(CaseStoreError::AlreadyExists(case.id));
        }
        case.version = 1;
        cases.insert(case.id.clone(), case);
        Ok(1)
    }

    fn load(&self, case_instance_id: &str) -> Result<Option<CaseInstance>, CaseStoreError> {
        Ok(self.read()?.get(case_instance_id).cloned())
    }

    fn commit(&self, mut case: CaseInstance, expected_version: u64) -> Result<u64, CaseStoreError> {
        let mut cases = self.write()?;
        let Some(stored) = cases.get(&case.id) else {
            return Err(CaseStoreError::NotFound(case.id));
        };
        check_version(stored, expected_version)?;
        let version = expected_version + 1;
        case.version = version;
        cases.insert(case.id.clone(), case);
        Ok(version)
    }

    fn remove(&self, case_instance_id: &str, expected_version: u64) -> Result<(), CaseStoreError> {
        let mut cases = self.write()?;
        let Some(stored) = cases.get(case_instance_id) else {
            return Err(CaseStoreError::NotFound(case_instance_id.to_string()));
        };
        check_version(stored, expected_version)?;
        cases.remove(case_instance_id);
        Ok(())
    }

    fn list(&self) -> Result<Vec<CaseInstance>, CaseStoreError> {
        Ok(self.read()?.values().cloned().collect())
    }

    fn find_case_for_plan_item(
        &self,
        plan_item_instance_id: &str,
    ) -> Result<Option<String>, CaseStoreError> {
        Ok(self
            .read()?
            .values()
            .find(|case| case.plan_items.contains_key(plan_item_instance_id))
            .map(|case| case.id.clone()))
    }

    fn find_case_for_job(&self, job_id: &str) -> Result<Option<String>, CaseStoreError> {
        Ok(self
            .read()?
            .values()
            .find(|case| case.timer_jobs.contains_key(job_id))
            .map(|case| case.id.clone()))
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
