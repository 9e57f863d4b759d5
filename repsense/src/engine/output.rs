//! Per-frame engine output.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FrameIssue;
use crate::motion::{ExercisePhase, JointExtrema};
use crate::recovery::RecoveryRequest;
use crate::session::{RepEvent, SessionStats};

/// Visual weight of a feedback message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Success,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Success => "success",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    /// `None` clears the previous message.
    pub message: Option<String>,
    pub severity: Severity,
}

impl Feedback {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            severity,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Severity::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "[{}] {}", self.severity, message),
            None => write!(f, "[{}]", self.severity),
        }
    }
}

/// What the engine did with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameDisposition {
    /// The frame went through the pipeline.
    Processed,
    /// The session is stopped or the frame carries a stale generation.
    Discarded,
    /// The frame arrived during a recovery backoff and was ignored.
    Backoff,
}

/// Everything the host needs after one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOutput {
    /// Present only when the feedback changed.
    pub feedback: Option<Feedback>,
    /// Present when this frame completed a repetition.
    pub rep: Option<RepEvent>,
    /// Smoothed angle extrema of the completed repetition.
    pub rep_angles: Option<JointExtrema>,
    /// Updated statistics, pushed after each repetition.
    pub stats: Option<SessionStats>,
    /// Phase after this frame.
    pub phase: ExercisePhase,
    /// The host should reset its detector and back off.
    pub recovery: Option<RecoveryRequest>,
    /// Frame-level problem recovered inside the engine.
    pub issue: Option<FrameIssue>,
    pub disposition: FrameDisposition,
}

impl EngineOutput {
    pub(crate) fn idle(phase: ExercisePhase, disposition: FrameDisposition) -> Self {
        Self {
            feedback: None,
            rep: None,
            rep_angles: None,
            stats: None,
            phase,
            recovery: None,
            issue: None,
            disposition,
        }
    }

    pub fn is_processed(&self) -> bool {
        self.disposition == FrameDisposition::Processed
    }
}
