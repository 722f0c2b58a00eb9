mod evaluator;

pub use evaluator::{
    compute_completion, mark_ancestors_dirty, mark_dirty, read_completable, refresh_completable,
    scope_is_active, set_state_change_unprocessed, state_change_unprocessed, CompletionScope,
    CompletionStatus,
};
