mod evaluator;

pub use evaluator::{evaluate_armed_sentries, evaluate_on_part_event, SentryFiring, SentryTarget};
