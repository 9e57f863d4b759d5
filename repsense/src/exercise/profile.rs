//! Exercise profiles.
//!
//! A profile is the complete per-exercise configuration applied at session
//! start: which joint drives the phase machine, the hysteresis thresholds,
//! the rep pattern and the form rule set.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::form::{FormRule, RuleCheck, RuleKind};
use crate::kinematics::{Joint, DEFAULT_KEYPOINT_CONFIDENCE, DEFAULT_WINDOW, MAX_WINDOW};
use crate::motion::{PhaseStyle, PhaseThresholds, RepPattern};

/// Default jitter threshold for the smoothness rule, in degrees.
pub const DEFAULT_JITTER_THRESHOLD_DEG: f64 = 20.0;

/// Points awarded per rule in the built-in rule sets.
const RULE_WEIGHT: f64 = 25.0;

/// Supported exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    Squat,
    Lunge,
    PushUp,
    Plank,
}

impl ExerciseKind {
    pub const ALL: [ExerciseKind; 4] = [
        ExerciseKind::Squat,
        ExerciseKind::Lunge,
        ExerciseKind::PushUp,
        ExerciseKind::Plank,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseKind::Squat => "squat",
            ExerciseKind::Lunge => "lunge",
            ExerciseKind::PushUp => "push_up",
            ExerciseKind::Plank => "plank",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ExerciseKind::Squat => "Bodyweight squat, counted on the knee angle",
            ExerciseKind::Lunge => "Forward lunge, counted on the front knee angle",
            ExerciseKind::PushUp => "Push-up, counted on the elbow angle",
            ExerciseKind::Plank => "Plank hold, tracked on the hip angle",
        }
    }
}

impl fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExerciseKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "squat" => Ok(ExerciseKind::Squat),
            "lunge" => Ok(ExerciseKind::Lunge),
            "push_up" | "pushup" => Ok(ExerciseKind::PushUp),
            "plank" => Ok(ExerciseKind::Plank),
            _ => Err(EngineError::UnknownExercise(s.to_string())),
        }
    }
}

/// Per-exercise configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseProfile {
    pub kind: ExerciseKind,
    /// Joint whose smoothed angle drives phase classification.
    pub primary_joint: Joint,
    pub style: PhaseStyle,
    pub thresholds: PhaseThresholds,
    /// `None` for hold exercises, which never count repetitions.
    pub rep_pattern: Option<RepPattern>,
    pub rules: Vec<FormRule>,
    pub jitter_threshold_deg: f64,
    pub smoothing_window: usize,
    pub keypoint_confidence: f64,
}

impl ExerciseProfile {
    /// Built-in profile for an exercise.
    pub fn builtin(kind: ExerciseKind) -> Self {
        let jitter = DEFAULT_JITTER_THRESHOLD_DEG;
        let (primary_joint, style, thresholds, rep_pattern, rules) = match kind {
            ExerciseKind::Squat => (
                Joint::Knee,
                PhaseStyle::Cyclic,
                PhaseThresholds::new(160.0, 100.0),
                Some(RepPattern::canonical()),
                squat_rules(jitter),
            ),
            ExerciseKind::Lunge => (
                Joint::Knee,
                PhaseStyle::Cyclic,
                PhaseThresholds::new(160.0, 100.0),
                Some(RepPattern::canonical()),
                lunge_rules(jitter),
            ),
            ExerciseKind::PushUp => (
                Joint::Elbow,
                PhaseStyle::Cyclic,
                PhaseThresholds::new(160.0, 90.0),
                Some(RepPattern::canonical()),
                push_up_rules(jitter),
            ),
            ExerciseKind::Plank => (
                Joint::Hip,
                PhaseStyle::Hold,
                PhaseThresholds::new(165.0, 150.0),
                None,
                Vec::new(),
            ),
        };

        Self {
            kind,
            primary_joint,
            style,
            thresholds,
            rep_pattern,
            rules,
            jitter_threshold_deg: jitter,
            smoothing_window: DEFAULT_WINDOW,
            keypoint_confidence: DEFAULT_KEYPOINT_CONFIDENCE,
        }
    }

    /// Built-in profile looked up by name.
    pub fn by_name(name: &str) -> EngineResult<Self> {
        Ok(Self::builtin(name.parse()?))
    }

    /// Sets the jitter threshold and updates every smoothness rule with it.
    pub fn set_jitter_threshold(&mut self, jitter_deg: f64) {
        self.jitter_threshold_deg = jitter_deg;
        for rule in &mut self.rules {
            if let RuleCheck::Smoothness { jitter_deg: current } = &mut rule.check {
                *current = jitter_deg;
            }
        }
    }

    /// Whether this exercise counts repetitions.
    pub fn counts_reps(&self) -> bool {
        self.rep_pattern.is_some()
    }

    /// Checks the profile before a session starts.
    pub fn validate(&self) -> EngineResult<()> {
        self.thresholds.validate().map_err(|msg| {
            EngineError::Configuration(format!("{} thresholds: {}", self.kind, msg))
        })?;

        if self.smoothing_window == 0 || self.smoothing_window > MAX_WINDOW {
            return Err(EngineError::Configuration(format!(
                "{} smoothing window must be between 1 and {} (got {})",
                self.kind, MAX_WINDOW, self.smoothing_window
            )));
        }

        if !(0.0..=1.0).contains(&self.keypoint_confidence) {
            return Err(EngineError::Configuration(format!(
                "{} keypoint confidence must be between 0 and 1 (got {})",
                self.kind, self.keypoint_confidence
            )));
        }

        if !self.jitter_threshold_deg.is_finite() || self.jitter_threshold_deg < 0.0 {
            return Err(EngineError::Configuration(format!(
                "{} jitter threshold must be a non-negative number of degrees",
                self.kind
            )));
        }

        if let Some(pattern) = self.rep_pattern {
            let vocabulary = self.style.vocabulary();
            if let Some(foreign) = pattern.phases.iter().find(|p| !vocabulary.contains(*p)) {
                return Err(EngineError::Configuration(format!(
                    "{} rep pattern '{}' uses phase '{}' outside the {} phase graph",
                    self.kind, pattern, foreign, self.style
                )));
            }
        }

        Ok(())
    }
}

impl Default for ExerciseProfile {
    fn default() -> Self {
        Self::builtin(ExerciseKind::Squat)
    }
}

fn smoothness_rule(jitter_deg: f64) -> FormRule {
    FormRule::new(
        RuleKind::Smoothness,
        RuleCheck::Smoothness { jitter_deg },
        RULE_WEIGHT,
        "Move at a steady, controlled pace",
    )
    .with_priority(3)
}

fn squat_rules(jitter_deg: f64) -> Vec<FormRule> {
    vec![
        FormRule::new(
            RuleKind::BackAngle,
            RuleCheck::MinAtLeast {
                joint: Joint::Hip,
                min_deg: 45.0,
            },
            RULE_WEIGHT,
            "Keep your chest up and back straight",
        )
        .hard()
        .with_priority(0),
        FormRule::new(
            RuleKind::KneeAlignment,
            RuleCheck::MinAtLeast {
                joint: Joint::Ankle,
                min_deg: 135.0,
            },
            RULE_WEIGHT,
            "Keep your knees behind your toes",
        )
        .with_priority(1),
        FormRule::new(
            RuleKind::Depth,
            RuleCheck::MinAtMost {
                joint: Joint::Knee,
                max_deg: 100.0,
            },
            RULE_WEIGHT,
            "Squat deeper, thighs parallel to the floor",
        )
        .hard()
        .with_priority(2),
        smoothness_rule(jitter_deg),
    ]
}

fn lunge_rules(jitter_deg: f64) -> Vec<FormRule> {
    vec![
        FormRule::new(
            RuleKind::TorsoUpright,
            RuleCheck::MinAtLeast {
                joint: Joint::Hip,
                min_deg: 70.0,
            },
            RULE_WEIGHT,
            "Keep your torso upright",
        )
        .hard()
        .with_priority(0),
        FormRule::new(
            RuleKind::KneeAlignment,
            RuleCheck::MinAtLeast {
                joint: Joint::Ankle,
                min_deg: 125.0,
            },
            RULE_WEIGHT,
            "Keep your front knee over your ankle",
        )
        .with_priority(1),
        FormRule::new(
            RuleKind::Depth,
            RuleCheck::MinAtMost {
                joint: Joint::Knee,
                max_deg: 100.0,
            },
            RULE_WEIGHT,
            "Lower your back knee closer to the floor",
        )
        .hard()
        .with_priority(2),
        smoothness_rule(jitter_deg),
    ]
}

fn push_up_rules(jitter_deg: f64) -> Vec<FormRule> {
    vec![
        FormRule::new(
            RuleKind::BodyLine,
            RuleCheck::MinAtLeast {
                joint: Joint::Hip,
                min_deg: 150.0,
            },
            RULE_WEIGHT,
            "Keep your body in a straight line, don't let your hips sag",
        )
        .hard()
        .with_priority(0),
        FormRule::new(
            RuleKind::NeckNeutral,
            RuleCheck::MinAtLeast {
                joint: Joint::Neck,
                min_deg: 140.0,
            },
            RULE_WEIGHT,
            "Keep your head in line with your spine",
        )
        .with_priority(1),
        FormRule::new(
            RuleKind::Depth,
            RuleCheck::MinAtMost {
                joint: Joint::Elbow,
                max_deg: 90.0,
            },
            RULE_WEIGHT,
            "Lower your chest until your elbows reach 90 degrees",
        )
        .hard()
        .with_priority(2),
        smoothness_rule(jitter_deg),
    ]
}
