mod expression;

pub use expression::ExpressionConditionEvaluator;
