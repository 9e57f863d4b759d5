//! Exercise definitions.
//!
//! Built-in profiles exist for squat, lunge, push-up and plank. Each one can
//! be overridden from the `[exercise.<name>]` sections of the config file.

mod profile;

pub use profile::{ExerciseKind, ExerciseProfile, DEFAULT_JITTER_THRESHOLD_DEG};
