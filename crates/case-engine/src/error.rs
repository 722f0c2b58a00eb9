use crate::store::CaseStoreError;
use case_core::{StructuredIssue, TransitionError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("plan item instance `{plan_item_instance_id}`: {source}")]
    InvalidTransition {
        plan_item_instance_id: String,
        #[source]
        source: TransitionError,
    },
    #[error("condition `{condition}` failed to evaluate: {reason}")]
    EvaluationFailure { condition: String, reason: String },
    #[error("lifecycle listener `{listener}` failed: {reason}")]
    ListenerFailure { listener: String, reason: String },
    #[error("case end interceptor rejected case `{case_instance_id}`: {reason}")]
    InterceptorFailure {
        case_instance_id: String,
        reason: String,
    },
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error("expected at most one {entity}, found {count}")]
    AmbiguousResult { entity: &'static str, count: usize },
    #[error("case `{case_instance_id}` was modified concurrently: expected version {expected}, found {actual}")]
    ConcurrentModification {
        case_instance_id: String,
        expected: u64,
        actual: u64,
    },
    #[error("unit of work exceeded {0} operations")]
    AgendaLimitExceeded(usize),
    #[error("no case definition deployed under key `{key}`")]
    UnknownDefinition { key: String },
    #[error("case definition is invalid ({} issue(s))", .0.len())]
    InvalidDefinition(Vec<StructuredIssue>),
    #[error("case `{case_instance_id}` is not active")]
    CaseNotActive { case_instance_id: String },
    #[error("`{id}` is not completable")]
    NotCompletable { id: String },
    #[error("plan item instance `{plan_item_instance_id}` is a {actual}, expected {expected}")]
    WrongPlanItemKind {
        plan_item_instance_id: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("command `{command_id}` was already applied")]
    DuplicateCommand { command_id: String },
    #[error("command `{command_id}` is still running")]
    CommandInFlight { command_id: String },
    #[error("listener issued a command that cannot run inside a unit of work: {command_type}")]
    UnsupportedListenerCommand { command_type: String },
    #[error("checkpoint definition hash `{actual}` does not match deployed `{expected}`")]
    DefinitionHashMismatch { expected: String, actual: String },
    #[error("serialization failed: {0}")]
    Serialization(String),
    #[error(transparent)]
    Store(#[from] CaseStoreError),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn is_concurrent_modification(&self) -> bool {
        matches!(self, EngineError::ConcurrentModification { .. })
    }
}
