use crate::agenda::DEFAULT_MAX_OPERATIONS;
use crate::commands::DuplicateCommandMode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineOptions {
    #[serde(default = "default_max_operations")]
    pub max_operations_per_unit: usize,
    #[serde(default)]
    pub duplicate_command_mode: DuplicateCommandMode,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_operations_per_unit: DEFAULT_MAX_OPERATIONS,
            duplicate_command_mode: DuplicateCommandMode::default(),
        }
    }
}

fn default_max_operations() -> usize {
    DEFAULT_MAX_OPERATIONS
}
