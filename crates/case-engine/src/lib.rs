pub mod agenda;
pub mod checkpoint;
pub mod commands;
pub mod completion;
pub mod condition;
pub mod context;
pub mod engine;
pub mod error;
pub mod events;
pub mod history;
pub mod model;
pub mod query;
pub mod sentry;
pub mod store;

#[cfg(test)]
mod test_support;

pub use agenda::{Agenda, Operation, TransitionOrigin, UnitOfWork, UnitOfWorkOutcome, DEFAULT_MAX_OPERATIONS};
pub use checkpoint::{
    create_checkpoint_document, decode_checkpoint_json, encode_checkpoint_json,
    load_checkpoint_from_path, save_checkpoint_to_path, CheckpointDocument, CheckpointStoreError,
    CHECKPOINT_SCHEMA_0_0_1,
};
pub use commands::{
    decode_command_jsonl_line, encode_command_jsonl_line, CaseCommand, CaseCommandEnvelope,
    CommandAdmission, CommandDeduper, DuplicateCommandMode, PlanItemTarget, StartCaseRequest,
    CASE_COMMAND_SCHEMA_0_0_1,
};
pub use completion::{CompletionScope, CompletionStatus};
pub use condition::ExpressionConditionEvaluator;
pub use context::{
    CaseEndInterceptor, Clock, ConditionEvaluator, ExecutionContext, FixedClock, HistorySink,
    JobRequest, JobScheduler, LifecycleListener, ListenerContext, ListenerRegistry,
    NoopJobScheduler, RecordingJobScheduler, SetVariablesListener, SystemClock,
};
pub use engine::{CaseEngine, CommandOutcome, DefinitionRepository, DeployedDefinition, EngineOptions};
pub use error::EngineError;
pub use events::{
    encode_event_jsonl_line, ensure_monotonic_sequence, parse_event_jsonl_line, CaseEvent,
    CaseEventRecord, CaseEventSequenceError, CaseEventStream, CaseEventType,
    CASE_EVENT_SCHEMA_0_0_1,
};
pub use history::InMemoryHistory;
pub use model::{CaseInstance, CaseState, MilestoneInstance, PlanItemInstance, TimerJob};
pub use query::{
    CaseInstanceQuery, HistoricCaseInstanceQuery, MilestoneInstanceQuery, PlanItemInstanceQuery,
    QueryError,
};
pub use sentry::{SentryFiring, SentryTarget};
pub use store::{CaseStore, CaseStoreError, InMemoryCaseStore};
