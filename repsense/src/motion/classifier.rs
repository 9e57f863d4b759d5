//! Hysteresis phase classification.
//!
//! Maps the smoothed primary-joint angle to an [`ExercisePhase`].
//!
//! # Detection Logic
//!
//! ```text
//! Cyclic:  angle > high  → Standing
//!          angle < low   → Bottom
//!          otherwise     → previous ∈ {Standing, Descending} ? Descending : Ascending
//!
//! Hold:    angle > high  → Holding
//!          angle < low   → Broken
//!          otherwise     → previous
//! ```
//!
//! Inside the dead zone the classifier keeps the direction it was already
//! travelling in, so a single noisy frame near a threshold cannot flip the
//! machine back and forth. Proposals that are not edges of the phase graph are
//! clamped (see [`PhaseStyle::clamp`]).

use serde::{Deserialize, Serialize};

use super::phase::{ExercisePhase, PhaseStyle};
use crate::error::FrameIssue;

/// High/low thresholds bounding the dead zone, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseThresholds {
    /// Angle above which the joint counts as extended.
    pub high_deg: f64,
    /// Angle below which the joint counts as fully flexed.
    pub low_deg: f64,
}

impl PhaseThresholds {
    pub fn new(high_deg: f64, low_deg: f64) -> Self {
        Self { high_deg, low_deg }
    }

    /// Thresholds must be finite, ordered, and inside [0°, 180°].
    pub fn validate(&self) -> Result<(), String> {
        if !self.high_deg.is_finite() || !self.low_deg.is_finite() {
            return Err("phase thresholds must be finite".to_string());
        }
        if !(0.0..=180.0).contains(&self.low_deg) || !(0.0..=180.0).contains(&self.high_deg) {
            return Err(format!(
                "phase thresholds must lie in [0, 180] (high={}, low={})",
                self.high_deg, self.low_deg
            ));
        }
        if self.high_deg <= self.low_deg {
            return Err(format!(
                "high threshold ({}) must exceed low threshold ({})",
                self.high_deg, self.low_deg
            ));
        }
        Ok(())
    }
}

/// Result of classifying one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Phase after this frame.
    pub phase: ExercisePhase,
    /// Phase before this frame.
    pub previous: ExercisePhase,
    /// Problem encountered while classifying, if any.
    pub issue: Option<FrameIssue>,
}

impl Classification {
    /// Whether the phase changed on this frame.
    pub fn changed(&self) -> bool {
        self.phase != self.previous
    }
}

/// Hysteresis state machine over one joint angle.
#[derive(Debug, Clone)]
pub struct PhaseClassifier {
    style: PhaseStyle,
    thresholds: PhaseThresholds,
    current: ExercisePhase,
}

impl PhaseClassifier {
    pub fn new(style: PhaseStyle, thresholds: PhaseThresholds) -> Self {
        Self {
            style,
            thresholds,
            current: style.initial_phase(),
        }
    }

    pub fn current_phase(&self) -> ExercisePhase {
        self.current
    }

    pub fn style(&self) -> PhaseStyle {
        self.style
    }

    pub fn thresholds(&self) -> PhaseThresholds {
        self.thresholds
    }

    /// Classifies one smoothed angle.
    ///
    /// An absent angle holds the current phase and reports
    /// [`FrameIssue::InsufficientKeypoints`].
    pub fn update(&mut self, angle: Option<f64>) -> Classification {
        let previous = self.current;

        let Some(angle) = angle.filter(|a| a.is_finite()) else {
            return Classification {
                phase: previous,
                previous,
                issue: Some(FrameIssue::InsufficientKeypoints),
            };
        };

        let proposed = self.propose(previous, angle);
        let phase = self.style.clamp(previous, proposed);

        let issue = if phase != proposed {
            tracing::warn!(
                from = %previous,
                proposed = %proposed,
                clamped_to = %phase,
                angle = format!("{:.1}", angle),
                "Illegal phase transition clamped"
            );
            Some(FrameIssue::InvalidTransitionAttempt)
        } else {
            None
        };

        if phase != previous {
            tracing::info!(
                from = %previous,
                to = %phase,
                angle = format!("{:.1}", angle),
                "Exercise phase transition"
            );
        }

        self.current = phase;
        Classification {
            phase,
            previous,
            issue,
        }
    }

    /// Raw hysteresis proposal, before graph clamping.
    fn propose(&self, previous: ExercisePhase, angle: f64) -> ExercisePhase {
        use ExercisePhase::*;

        match self.style {
            PhaseStyle::Cyclic => {
                if angle > self.thresholds.high_deg {
                    Standing
                } else if angle < self.thresholds.low_deg {
                    Bottom
                } else {
                    match previous {
                        Standing | Descending => Descending,
                        Bottom | Ascending => Ascending,
                        Holding | Broken => previous,
                    }
                }
            }
            PhaseStyle::Hold => {
                if angle > self.thresholds.high_deg {
                    Holding
                } else if angle < self.thresholds.low_deg {
                    Broken
                } else {
                    previous
                }
            }
        }
    }

    /// Returns to the initial phase.
    pub fn reset(&mut self) {
        self.current = self.style.initial_phase();
    }
}
