//! Motion state machine and repetition detection.
//!
//! # Module Structure
//!
//! ```text
//! motion/
//! ├── mod.rs          # This file - module exports
//! ├── phase.rs        # ExercisePhase, PhaseStyle (legal transitions), RepPattern
//! ├── classifier.rs   # Hysteresis classifier over the smoothed primary angle
//! └── repetition.rs   # Rep boundary detection and per-rep extrema
//! ```

mod classifier;
mod phase;
mod repetition;

pub use classifier::{Classification, PhaseClassifier, PhaseThresholds};
pub use phase::{ExercisePhase, PhaseStyle, RepPattern};
pub use repetition::{AngleExtrema, JointExtrema, RepBoundary, RepetitionDetector, MAX_TRACE_SAMPLES};
