//! Error types for the repetition engine.
//!
//! Two tiers exist:
//!
//! - [`FrameIssue`]: frame-level problems. These never cross the engine
//!   boundary as errors; they become feedback and are counted by the failure
//!   handler.
//! - [`EngineError`]: hard errors surfaced to the host. Only configuration
//!   errors at session start and exhausted recovery produce them.

use std::fmt;

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Hard errors surfaced to the host.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The session was configured with an exercise the engine does not know.
    #[error("Unknown exercise type: {0}")]
    UnknownExercise(String),

    /// A configuration value is out of range or inconsistent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Configuration file could not be loaded.
    #[error(transparent)]
    ConfigFile(#[from] crate::config::ConfigError),

    /// Recovery attempts were exhausted while detections kept failing.
    #[error("Pose detection keeps failing after {attempts} recovery attempts; restart the camera")]
    RecoveryExhausted { attempts: u32 },
}

impl EngineError {
    /// Whether the error was raised while starting a session.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            EngineError::UnknownExercise(_)
                | EngineError::Configuration(_)
                | EngineError::ConfigFile(_)
        )
    }
}

/// Frame-level problems, recovered inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameIssue {
    /// Keypoints needed for the exercise's joints are missing or unconfident.
    InsufficientKeypoints,

    /// The detection's overall score is below the confidence floor.
    LowConfidenceDetection,

    /// The external inference call failed or returned no keypoints.
    DetectionFailure,

    /// The classifier proposed a transition outside the phase graph.
    InvalidTransitionAttempt,
}

impl FrameIssue {
    /// Whether the issue counts towards the failure handler's counter.
    pub fn counts_as_failure(&self) -> bool {
        matches!(
            self,
            FrameIssue::LowConfidenceDetection | FrameIssue::DetectionFailure
        )
    }

    /// Short identifier used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameIssue::InsufficientKeypoints => "insufficient_keypoints",
            FrameIssue::LowConfidenceDetection => "low_confidence_detection",
            FrameIssue::DetectionFailure => "detection_failure",
            FrameIssue::InvalidTransitionAttempt => "invalid_transition_attempt",
        }
    }
}

impl fmt::Display for FrameIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
