use crate::model::CaseInstance;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const CHECKPOINT_SCHEMA_0_0_1: &str = "case-checkpoint/0.0.1";

/// A running case saved between process runs, pinned to the definition hash it ran on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckpointDocument {
    pub schema: String,
    pub definition_hash: String,
    pub case_instance: CaseInstance,
    #[serde(default)]
    pub seen_command_ids: Vec<String>,
}

impl CheckpointDocument {
    pub fn new(case_instance: CaseInstance, seen_command_ids: Vec<String>) -> Self {
        Self {
            schema: CHECKPOINT_SCHEMA_0_0_1.to_string(),
            definition_hash: case_instance.definition_hash.clone(),
            case_instance,
            seen_command_ids: dedup_sort_strings(seen_command_ids),
        }
    }
}

pub fn create_checkpoint_document(
    case_instance: &CaseInstance,
    seen_command_ids: impl IntoIterator<Item = String>,
) -> CheckpointDocument {
    CheckpointDocument::new(case_instance.clone(), seen_command_ids.into_iter().collect())
}

pub fn encode_checkpoint_json(document: &CheckpointDocument) -> serde_json::Result<String> {
    serde_json::to_string_pretty(document)
}

pub fn decode_checkpoint_json(input: &str) -> serde_json::Result<CheckpointDocument> {
    serde_json::from_str::<CheckpointDocument>(input)
}

fn dedup_sort_strings(values: Vec<String>) -> Vec<String> {
    values.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
