mod memory;

pub use memory::InMemoryCaseStore;

use crate::model::CaseInstance;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaseStoreError {
    #[error("case `{0}` already exists")]
    AlreadyExists(String),
    #[error("case `{0}` not found")]
    NotFound(String),
    #[error("case `{case_instance_id}` version conflict: expected {expected}, found {actual}")]
    VersionConflict {
        case_instance_id: String,
        expected: u64,
        actual: u64,
    },
    #[error("case store lock poisoned")]
    Poisoned,
}

/// Runtime persistence of running cases. Every write is guarded by the case version.
pub trait CaseStore: Send + Sync {
    /// Stores a new case and returns its first version.
    fn insert(&self, case: CaseInstance) -> Result<u64, CaseStoreError>;
    fn load(&self, case_instance_id: &str) -> Result<Option<CaseInstance>, CaseStoreError>;
    /// Replaces the case when the stored version still equals `expected_version`; returns the
    /// new version.
    fn commit(&self, case: CaseInstance, expected_version: u64) -> Result<u64, CaseStoreError>;
    fn remove(&self, case_instance_id: &str, expected_version: u64) -> Result<(), CaseStoreError>;
    fn list(&self) -> Result<Vec<CaseInstance>, CaseStoreError>;
    fn find_case_for_plan_item(
        &self,
        plan_item_instance_id: &str,
    ) -> Result<Option<String>, CaseStoreError>;
    fn find_case_for_job(&self, job_id: &str) -> Result<Option<String>, CaseStoreError>;
}
