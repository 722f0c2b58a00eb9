use super::{load_checkpoint_from_path, save_checkpoint_to_path, CheckpointStoreError};
use crate::checkpoint::{create_checkpoint_document, encode_checkpoint_json};
use crate::test_support::empty_case;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_checkpoint_path(label: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock ok")
        .as_nanos();
    std::env::temp_dir()
        .join(format!("case-engine-{label}-{}-{nanos}", std::process::id()))
        .join("checkpoint.json")
}

#[test]
fn save_creates_directories_and_load_returns_same_document() {
    let path = temp_checkpoint_path("checkpoint-save");
    let document = create_checkpoint_document(&empty_case("case-store-1"), vec!["cmd-1".to_string()]);

    save_checkpoint_to_path(&path, &document).expect("must save");
    let loaded = load_checkpoint_from_path(&path).expect("must load");
    assert_eq!(loaded, document);
    assert!(!path.with_file_name("checkpoint.json.tmp").exists());

    let mut advanced = empty_case("case-store-1");
    advanced.version = 7;
    let replacement = create_checkpoint_document(&advanced, Vec::new());
    save_checkpoint_to_path(&path, &replacement).expect("must overwrite");
    assert_eq!(
        load_checkpoint_from_path(&path).expect("must load").case_instance.version,
        7
    );
}

#[test]
fn missing_checkpoint_is_an_io_error() {
    let path = std::env::temp_dir().join("case-engine-checkpoint-does-not-exist.json");
    assert!(matches!(
        load_checkpoint_from_path(&path),
        Err(CheckpointStoreError::Io(_))
    ));
}

#[test]
fn load_rejects_foreign_schema_and_tampered_hash() {
    let path = temp_checkpoint_path("checkpoint-schema");
    std::fs::create_dir_all(path.parent().expect("parent")).expect("dir");

    let mut document = create_checkpoint_document(&empty_case("case-store-2"), Vec::new());
    document.schema = "case-checkpoint/9.9.9".to_string();
    std::fs::write(&path, encode_checkpoint_json(&document).expect("encode")).expect("write");
    assert!(matches!(
        load_checkpoint_from_path(&path),
        Err(CheckpointStoreError::UnsupportedSchema { .. })
    ));

    let mut document = create_checkpoint_document(&empty_case("case-store-2"), Vec::new());
    document.definition_hash = "tampered".to_string();
    std::fs::write(&path, encode_checkpoint_json(&document).expect("encode")).expect("write");
    assert!(matches!(
        load_checkpoint_from_path(&path),
        Err(CheckpointStoreError::HashMismatch { .. })
    ));
}
