//! Form evaluation for completed repetitions.
//!
//! Each exercise carries a fixed, weighted rule set. A repetition is good form
//! only when every hard-fail rule passes; the quality score is reported
//! regardless.

mod evaluator;
mod rules;

pub use evaluator::{FormEvaluator, FormVerdict, GOOD_FORM_FEEDBACK};
pub use rules::{max_second_difference, FormRule, RuleCheck, RuleKind, RuleOutcome};
