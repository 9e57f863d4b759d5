//! Per-repetition events.

use serde::{Deserialize, Serialize};

use crate::exercise::ExerciseKind;
use crate::form::RuleKind;

/// One scored repetition. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepEvent {
    /// Host timestamp of the frame that completed the repetition.
    pub timestamp_ms: u64,
    pub exercise: ExerciseKind,
    /// 1-based position of this repetition within the session.
    pub rep_number: u32,
    pub is_good_form: bool,
    /// Weighted form score in [0, 100].
    pub quality_score: u8,
    pub violated_rules: Vec<RuleKind>,
    /// Span of the primary joint angle over the repetition, in degrees.
    pub range_of_motion: f64,
    pub feedback: String,
}
