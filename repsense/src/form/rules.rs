//! Form rule definitions.
//!
//! A rule inspects the [`RepBoundary`] of one repetition and passes, fails,
//! or is skipped when the evidence it needs was never observed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::kinematics::Joint;
use crate::motion::RepBoundary;

/// Identifies a form rule in events and persisted records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Depth,
    BackAngle,
    KneeAlignment,
    TorsoUpright,
    BodyLine,
    NeckNeutral,
    Smoothness,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Depth => "depth",
            RuleKind::BackAngle => "back_angle",
            RuleKind::KneeAlignment => "knee_alignment",
            RuleKind::TorsoUpright => "torso_upright",
            RuleKind::BodyLine => "body_line",
            RuleKind::NeckNeutral => "neck_neutral",
            RuleKind::Smoothness => "smoothness",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a rule measures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum RuleCheck {
    /// The joint's smallest angle must be at most `max_deg` (e.g. depth).
    MinAtMost { joint: Joint, max_deg: f64 },
    /// The joint's smallest angle must be at least `min_deg` (e.g. back angle).
    MinAtLeast { joint: Joint, min_deg: f64 },
    /// No second difference of the raw trace may exceed `jitter_deg`.
    Smoothness { jitter_deg: f64 },
}

/// Outcome of one rule for one repetition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOutcome {
    Passed,
    Failed,
    /// The rule's joint was never observed during the repetition.
    Skipped,
}

/// A weighted form rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormRule {
    pub kind: RuleKind,
    pub check: RuleCheck,
    /// Contribution to the quality score when passed.
    pub weight: f64,
    /// A failed hard rule makes the repetition bad regardless of score.
    pub hard_fail: bool,
    /// Feedback priority; lower is more safety-relevant.
    pub priority: u8,
    /// Actionable text shown when the rule fails.
    pub message: String,
}

impl FormRule {
    pub fn new(kind: RuleKind, check: RuleCheck, weight: f64, message: impl Into<String>) -> Self {
        Self {
            kind,
            check,
            weight,
            hard_fail: false,
            priority: u8::MAX,
            message: message.into(),
        }
    }

    pub fn hard(mut self) -> Self {
        self.hard_fail = true;
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Weight usable for scoring (non-negative and finite).
    pub fn effective_weight(&self) -> f64 {
        if self.weight.is_finite() {
            self.weight.max(0.0)
        } else {
            0.0
        }
    }

    /// Evaluates this rule against one repetition.
    pub fn evaluate(&self, rep: &RepBoundary) -> RuleOutcome {
        match self.check {
            RuleCheck::MinAtMost { joint, max_deg } => match rep.extrema.get(joint).min {
                Some(min) if min <= max_deg => RuleOutcome::Passed,
                Some(_) => RuleOutcome::Failed,
                None => RuleOutcome::Skipped,
            },
            RuleCheck::MinAtLeast { joint, min_deg } => match rep.extrema.get(joint).min {
                Some(min) if min >= min_deg => RuleOutcome::Passed,
                Some(_) => RuleOutcome::Failed,
                None => RuleOutcome::Skipped,
            },
            RuleCheck::Smoothness { jitter_deg } => {
                if rep.trace.len() < 3 {
                    RuleOutcome::Skipped
                } else if max_second_difference(&rep.trace) <= jitter_deg {
                    RuleOutcome::Passed
                } else {
                    RuleOutcome::Failed
                }
            }
        }
    }
}

/// Largest `|a[i] - 2a[i-1] + a[i-2]|` over the trace.
///
/// A discrete jerk detector: sudden changes of angular rate indicate either
/// tracking noise or a jerky movement.
pub fn max_second_difference(trace: &[f64]) -> f64 {
    trace
        .windows(3)
        .map(|w| (w[2] - 2.0 * w[1] + w[0]).abs())
        .fold(0.0, f64::max)
}
