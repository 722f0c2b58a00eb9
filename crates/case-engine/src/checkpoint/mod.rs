mod store;
mod types;

pub use store::{load_checkpoint_from_path, save_checkpoint_to_path, CheckpointStoreError};
pub use types::{
    create_checkpoint_document, decode_checkpoint_json, encode_checkpoint_json,
    CheckpointDocument, CHECKPOINT_SCHEMA_0_0_1,
};
