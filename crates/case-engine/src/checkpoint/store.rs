use super::{decode_checkpoint_json, encode_checkpoint_json, CheckpointDocument, CHECKPOINT_SCHEMA_0_0_1};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum CheckpointStoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported checkpoint schema `{found}` (expected `{CHECKPOINT_SCHEMA_0_0_1}`)")]
    UnsupportedSchema { found: String },
    #[error("checkpoint pins definition hash `{pinned}` but its case ran on `{actual}`")]
    HashMismatch { pinned: String, actual: String },
}

/// Saves the checkpoint as pretty JSON. The file is replaced in one rename, so a crash mid-write
/// leaves the previous checkpoint intact.
pub fn save_checkpoint_to_path(
    path: impl AsRef<Path>,
    document: &CheckpointDocument,
) -> Result<(), CheckpointStoreError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let encoded = encode_checkpoint_json(document)?;
    let staging = staging_path(path);
    fs::write(&staging, encoded)?;
    fs::rename(&staging, path)?;
    debug!(
        path = %path.display(),
        case_instance_id = %document.case_instance.id,
        version = document.case_instance.version,
        "checkpoint saved"
    );
    Ok(())
}

pub fn load_checkpoint_from_path(path: impl AsRef<Path>) -> Result<CheckpointDocument, CheckpointStoreError> {
    let content = fs::read_to_string(path)?;
    let document = decode_checkpoint_json(&content)?;
    if document.schema != CHECKPOINT_SCHEMA_0_0_1 {
        return Err(CheckpointStoreError::UnsupportedSchema {
            found: document.schema,
        });
    }
    if document.definition_hash != document.case_instance.definition_hash {
        return Err(CheckpointStoreError::HashMismatch {
            pinned: document.definition_hash,
            actual: document.case_instance.definition_hash,
        });
    }
    Ok(document)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
