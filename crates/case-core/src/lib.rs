pub mod definition;
pub mod field_path;
pub mod graph;
pub mod issues;
pub mod lifecycle;
pub mod stable_hash;
pub mod validate;

pub use definition::{
    decode_case_definition_json, CaseDefinition, IfPart, LifecycleListenerDefinition, ListenerAction,
    OnPart, PlanItemDefinition, PlanItemKind, Sentry, SentryKind, CASE_DEFINITION_SCHEMA_0_0_1,
};
pub use field_path::{FieldPath, FieldPathSegment};
pub use graph::{DefinitionGraph, SentryRef};
pub use issues::{IssueSeverity, StructuredIssue};
pub use lifecycle::{resolve_transition, PlanItemState, PlanItemTransition, TransitionError};
pub use stable_hash::{definition_hash, stable_hash_hex, stable_json_bytes};
pub use validate::validate_case_definition;
