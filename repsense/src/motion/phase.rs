//! Exercise phases and the graphs of legal transitions between them.
//!
//! # Cyclic Exercises (squat, lunge, push-up)
//!
//! ```text
//! Standing ──[dead zone]──► Descending ──[< low]──► Bottom
//!    ▲   └──────────────[< low]───────────────────►   │
//!    │                                                │ [dead zone]
//!    └──────────[> high]────────── Ascending ◄────────┘
//! ```
//!
//! Legal edges: `Standing→Descending`, `Standing→Bottom`,
//! `Descending→Bottom`, `Descending→Standing` (aborted descent),
//! `Bottom→Ascending`, `Ascending→Standing`, `Ascending→Bottom` (re-dip).
//! `Bottom→Standing` skips the ascent and is illegal.
//!
//! # Hold Exercises (plank)
//!
//! ```text
//! Holding ◄──► Broken
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Classified stage of an exercise movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExercisePhase {
    /// Top of the movement, joint extended.
    Standing,
    /// Moving from the top towards the bottom.
    Descending,
    /// Full flexion reached.
    Bottom,
    /// Moving from the bottom back to the top.
    Ascending,
    /// Static hold with correct alignment.
    Holding,
    /// Static hold with alignment lost.
    Broken,
}

impl ExercisePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExercisePhase::Standing => "standing",
            ExercisePhase::Descending => "descending",
            ExercisePhase::Bottom => "bottom",
            ExercisePhase::Ascending => "ascending",
            ExercisePhase::Holding => "holding",
            ExercisePhase::Broken => "broken",
        }
    }
}

impl fmt::Display for ExercisePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExercisePhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standing" => Ok(ExercisePhase::Standing),
            "descending" => Ok(ExercisePhase::Descending),
            "bottom" => Ok(ExercisePhase::Bottom),
            "ascending" => Ok(ExercisePhase::Ascending),
            "holding" => Ok(ExercisePhase::Holding),
            "broken" => Ok(ExercisePhase::Broken),
            other => Err(format!("unknown phase '{}'", other)),
        }
    }
}

/// Shape of an exercise's phase vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStyle {
    /// Standing → Descending → Bottom → Ascending → Standing.
    Cyclic,
    /// Holding ⇄ Broken.
    Hold,
}

impl PhaseStyle {
    /// Phase a fresh session starts in.
    pub fn initial_phase(&self) -> ExercisePhase {
        match self {
            PhaseStyle::Cyclic => ExercisePhase::Standing,
            PhaseStyle::Hold => ExercisePhase::Holding,
        }
    }

    /// Phases in cycle order.
    pub fn vocabulary(&self) -> &'static [ExercisePhase] {
        match self {
            PhaseStyle::Cyclic => &[
                ExercisePhase::Standing,
                ExercisePhase::Descending,
                ExercisePhase::Bottom,
                ExercisePhase::Ascending,
            ],
            PhaseStyle::Hold => &[ExercisePhase::Holding, ExercisePhase::Broken],
        }
    }

    /// Whether `from → to` is an edge of this style's graph.
    ///
    /// Staying in the same phase is always legal.
    pub fn is_legal(&self, from: ExercisePhase, to: ExercisePhase) -> bool {
        use ExercisePhase::*;

        if from == to {
            return self.vocabulary().contains(&to);
        }

        match self {
            PhaseStyle::Cyclic => matches!(
                (from, to),
                (Standing, Descending)
                    | (Standing, Bottom)
                    | (Descending, Bottom)
                    | (Descending, Standing)
                    | (Bottom, Ascending)
                    | (Ascending, Standing)
                    | (Ascending, Bottom)
            ),
            PhaseStyle::Hold => matches!((from, to), (Holding, Broken) | (Broken, Holding)),
        }
    }

    /// Resolves a proposed transition to a legal one.
    ///
    /// Legal proposals pass through. Otherwise the machine advances one step
    /// along the cycle from `from` when that step is legal, and holds `from`
    /// when it is not.
    pub fn clamp(&self, from: ExercisePhase, proposed: ExercisePhase) -> ExercisePhase {
        if self.is_legal(from, proposed) {
            return proposed;
        }

        let vocabulary = self.vocabulary();
        let next = vocabulary
            .iter()
            .position(|p| *p == from)
            .map(|i| vocabulary[(i + 1) % vocabulary.len()]);

        match next {
            Some(step) if self.is_legal(from, step) => step,
            Some(_) => from,
            None => self.initial_phase(),
        }
    }
}

impl fmt::Display for PhaseStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseStyle::Cyclic => write!(f, "cyclic"),
            PhaseStyle::Hold => write!(f, "hold"),
        }
    }
}

/// The three-phase sequence that completes one repetition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepPattern {
    pub phases: [ExercisePhase; 3],
}

impl RepPattern {
    pub fn new(full: ExercisePhase, mid: ExercisePhase, rest: ExercisePhase) -> Self {
        Self {
            phases: [full, mid, rest],
        }
    }

    /// `Bottom → Ascending → Standing`.
    pub fn canonical() -> Self {
        Self::new(
            ExercisePhase::Bottom,
            ExercisePhase::Ascending,
            ExercisePhase::Standing,
        )
    }

    pub fn matches(&self, history: &[ExercisePhase]) -> bool {
        history == &self.phases[..]
    }
}

impl Default for RepPattern {
    fn default() -> Self {
        Self::canonical()
    }
}

impl fmt::Display for RepPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}>{}>{}",
            self.phases[0], self.phases[1], self.phases[2]
        )
    }
}

impl std::str::FromStr for RepPattern {
    type Err = String;

    /// Parses `bottom>ascending>standing`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let phases = s
            .split('>')
            .map(str::parse::<ExercisePhase>)
            .collect::<Result<Vec<_>, _>>()?;
        match phases.as_slice() {
            [a, b, c] => Ok(Self::new(*a, *b, *c)),
            _ => Err(format!(
                "rep pattern '{}' must name exactly three phases",
                s
            )),
        }
    }
}
