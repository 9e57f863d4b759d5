//! repsense - Exercise repetition detection from pose keypoint streams
//!
//! This library turns a per-frame stream of body keypoints, produced by an
//! external pose-estimation model, into scored exercise repetitions with
//! real-time feedback. It copes with noisy and missing detections and adapts
//! the processing rate to the host's latency.
//!
//! # Example
//!
//! ```
//! use repsense::{Engine, FrameResult, PoseDetection};
//!
//! let mut engine = Engine::for_exercise("squat")?;
//! let frame = FrameResult::pose(0, PoseDetection::empty());
//! let output = engine.process_frame(&frame)?;
//! assert!(output.rep.is_none());
//! assert_eq!(engine.failure_count(), 1);
//! # Ok::<(), repsense::EngineError>(())
//! ```

pub mod adaptive;
pub mod config;
pub mod engine;
pub mod error;
pub mod exercise;
pub mod form;
pub mod kinematics;
pub mod logging;
pub mod motion;
pub mod persist;
pub mod pose;
pub mod recovery;
pub mod session;

pub use config::{ConfigError, ConfigFile, EngineConfig};
pub use engine::{Engine, EngineOutput, Feedback, FrameDisposition, Severity, SharedEngine};
pub use error::{EngineError, EngineResult, FrameIssue};
pub use exercise::{ExerciseKind, ExerciseProfile};
pub use motion::ExercisePhase;
pub use pose::{Detection, FrameResult, Keypoint, Landmark, PoseDetection};
pub use session::{RepEvent, SessionStats};
