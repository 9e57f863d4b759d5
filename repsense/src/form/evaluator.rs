//! Repetition scoring.
//!
//! # Scoring
//!
//! ```text
//! quality_score = round(100 × Σ weight(passed) / Σ weight(passed ∪ failed))
//! is_good_form  = no hard-fail rule failed
//! ```
//!
//! Skipped rules contribute to neither sum. When every evaluated rule has zero
//! weight the score is 100 if nothing failed and 0 otherwise, so the score
//! stays in [0, 100] for any weight configuration.

use serde::{Deserialize, Serialize};

use super::rules::{FormRule, RuleKind, RuleOutcome};
use crate::motion::RepBoundary;

/// Feedback shown for a repetition with no failing rule.
pub const GOOD_FORM_FEEDBACK: &str = "Great form!";

/// Result of scoring one repetition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormVerdict {
    pub is_good_form: bool,
    /// Weighted score in [0, 100].
    pub quality_score: u8,
    /// Failed rules, most safety-relevant first.
    pub violated_rules: Vec<RuleKind>,
    /// Every rule with its outcome, in rule-set order.
    pub outcomes: Vec<(RuleKind, RuleOutcome)>,
    /// Text of the highest-priority failing rule.
    pub feedback: String,
}

/// Scores repetitions against a fixed rule set.
#[derive(Debug, Clone, Default)]
pub struct FormEvaluator {
    rules: Vec<FormRule>,
}

impl FormEvaluator {
    pub fn new(rules: Vec<FormRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[FormRule] {
        &self.rules
    }

    /// Scores one completed repetition.
    pub fn evaluate(&self, rep: &RepBoundary) -> FormVerdict {
        let mut passed_weight = 0.0;
        let mut total_weight = 0.0;
        let mut hard_failed = false;
        let mut failed: Vec<&FormRule> = Vec::new();
        let mut outcomes = Vec::with_capacity(self.rules.len());

        for rule in &self.rules {
            let outcome = rule.evaluate(rep);
            match outcome {
                RuleOutcome::Passed => {
                    passed_weight += rule.effective_weight();
                    total_weight += rule.effective_weight();
                }
                RuleOutcome::Failed => {
                    total_weight += rule.effective_weight();
                    hard_failed |= rule.hard_fail;
                    failed.push(rule);
                }
                RuleOutcome::Skipped => {}
            }
            outcomes.push((rule.kind, outcome));
        }

        let quality_score = score(passed_weight, total_weight, !failed.is_empty());

        // Stable sort keeps rule-set order among equal priorities
        failed.sort_by_key(|rule| rule.priority);
        let feedback = failed
            .first()
            .map(|rule| rule.message.clone())
            .unwrap_or_else(|| GOOD_FORM_FEEDBACK.to_string());

        FormVerdict {
            is_good_form: !hard_failed,
            quality_score,
            violated_rules: failed.iter().map(|rule| rule.kind).collect(),
            outcomes,
            feedback,
        }
    }
}

fn score(passed_weight: f64, total_weight: f64, any_failed: bool) -> u8 {
    if total_weight > 0.0 {
        let ratio = (passed_weight / total_weight).clamp(0.0, 1.0);
        (ratio * 100.0).round() as u8
    } else if any_failed {
        0
    } else {
        100
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::rules::RuleCheck;
    use crate::kinematics::{Joint, JointAngleSet};
    use crate::motion::JointExtrema;

    fn depth(max_deg: f64, weight: f64) -> FormRule {
        FormRule::new(
            RuleKind::Depth,
            RuleCheck::MinAtMost {
                joint: Joint::Knee,
                max_deg,
            },
            weight,
            "Squat deeper",
        )
        .hard()
        .with_priority(1)
    }

    fn back(min_deg: f64, weight: f64) -> FormRule {
        FormRule::new(
            RuleKind::BackAngle,
            RuleCheck::MinAtLeast {
                joint: Joint::Hip,
                min_deg,
            },
            weight,
            "Keep your chest up",
        )
        .hard()
        .with_priority(0)
    }

    fn smooth(weight: f64) -> FormRule {
        FormRule::new(
            RuleKind::Smoothness,
            RuleCheck::Smoothness { jitter_deg: 20.0 },
            weight,
            "Move smoothly",
        )
        .with_priority(5)
    }

    fn rep(knee_min: f64, hip_min: Option<f64>, trace: Vec<f64>) -> RepBoundary {
        let mut extrema = JointExtrema::default();
        extrema.record(
            &JointAngleSet::empty()
                .with(Joint::Knee, Some(knee_min))
                .with(Joint::Hip, hip_min),
        );
        RepBoundary {
            started_at_ms: 0,
            ended_at_ms: 2000,
            extrema,
            trace,
        }
    }

    #[test]
    fn test_all_rules_pass() {
        let evaluator = FormEvaluator::new(vec![back(45.0, 25.0), depth(100.0, 25.0), smooth(25.0)]);
        let verdict = evaluator.evaluate(&rep(90.0, Some(80.0), vec![170.0, 160.0, 150.0]));
        assert!(verdict.is_good_form);
        assert_eq!(verdict.quality_score, 100);
        assert!(verdict.violated_rules.is_empty());
        assert_eq!(verdict.feedback, GOOD_FORM_FEEDBACK);
    }

    #[test]
    fn test_hard_failure_makes_form_bad() {
        let evaluator = FormEvaluator::new(vec![back(45.0, 25.0), depth(100.0, 25.0), smooth(25.0)]);
        let verdict = evaluator.evaluate(&rep(120.0, Some(80.0), vec![170.0, 160.0, 150.0]));
        assert!(!verdict.is_good_form);
        assert_eq!(verdict.quality_score, 67);
        assert_eq!(verdict.violated_rules, vec![RuleKind::Depth]);
        assert_eq!(verdict.feedback, "Squat deeper");
    }

    #[test]
    fn test_soft_failure_keeps_form_good() {
        let evaluator = FormEvaluator::new(vec![depth(100.0, 25.0), smooth(25.0)]);
        let verdict = evaluator.evaluate(&rep(90.0, None, vec![170.0, 120.0, 170.0]));
        assert!(verdict.is_good_form);
        assert_eq!(verdict.quality_score, 50);
        assert_eq!(verdict.violated_rules, vec![RuleKind::Smoothness]);
    }

    #[test]
    fn test_feedback_prefers_safety_rule() {
        let evaluator = FormEvaluator::new(vec![depth(100.0, 25.0), back(45.0, 25.0)]);
        let verdict = evaluator.evaluate(&rep(120.0, Some(30.0), vec![]));
        assert_eq!(verdict.violated_rules, vec![RuleKind::BackAngle, RuleKind::Depth]);
        assert_eq!(verdict.feedback, "Keep your chest up");
        assert_eq!(verdict.quality_score, 0);
    }

    #[test]
    fn test_skipped_rule_excluded_from_score() {
        let evaluator = FormEvaluator::new(vec![back(45.0, 25.0), depth(100.0, 25.0)]);
        let verdict = evaluator.evaluate(&rep(90.0, None, vec![]));
        assert!(verdict.is_good_form);
        assert_eq!(verdict.quality_score, 100);
        assert!(verdict
            .outcomes
            .contains(&(RuleKind::BackAngle, RuleOutcome::Skipped)));
    }

    #[test]
    fn test_zero_weights() {
        let evaluator = FormEvaluator::new(vec![depth(100.0, 0.0)]);
        assert_eq!(evaluator.evaluate(&rep(90.0, None, vec![])).quality_score, 100);
        assert_eq!(evaluator.evaluate(&rep(120.0, None, vec![])).quality_score, 0);
    }

    #[test]
    fn test_empty_rule_set() {
        let verdict = FormEvaluator::default().evaluate(&rep(90.0, None, vec![]));
        assert!(verdict.is_good_form);
        assert_eq!(verdict.quality_score, 100);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_score_bounded_and_hard_fail_is_bad(
                weights in proptest::collection::vec(-50.0..500.0_f64, 3),
                knee_min in 0.0..180.0_f64,
                hip_min in proptest::option::of(0.0..180.0_f64),
                trace in proptest::collection::vec(0.0..180.0_f64, 0..30),
            ) {
                let rules = vec![
                    back(45.0, weights[0]),
                    depth(100.0, weights[1]),
                    smooth(weights[2]),
                ];
                let evaluator = FormEvaluator::new(rules.clone());
                let boundary = rep(knee_min, hip_min, trace);
                let verdict = evaluator.evaluate(&boundary);

                prop_assert!(verdict.quality_score <= 100);

                let hard_failed = rules
                    .iter()
                    .any(|r| r.hard_fail && r.evaluate(&boundary) == RuleOutcome::Failed);
                prop_assert_eq!(verdict.is_good_form, !hard_failed);
            }
        }
    }
}
