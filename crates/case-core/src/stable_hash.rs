use crate::definition::CaseDefinition;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Serializes `value` with object keys sorted at every level.
pub fn stable_json_bytes(value: &Value) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&normalize_value(value))
}

pub fn stable_hash_hex(value: &Value) -> serde_json::Result<String> {
    let bytes = stable_json_bytes(value)?;
    let digest = Sha256::digest(bytes);
    Ok(format!("{digest:x}"))
}

pub fn definition_hash(definition: &CaseDefinition) -> serde_json::Result<String> {
    stable_hash_hex(&serde_json::to_value(definition)?)
}

fn normalize_value(value: &Value) -> Value {
    match value {
        Value::Object(object) => {
            let ordered = object
                .iter()
                .map(|(key, child)| (key.clone(), normalize_value(child)))
                .collect::<BTreeMap<_, _>>();
            Value::Object(ordered.into_iter().collect::<Map<_, _>>())
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize_value).collect()),
        _ => value.clone(),
    }
}

#[cfg(test)]
#[path = "stable_hash_test.rs"]
mod tests;
