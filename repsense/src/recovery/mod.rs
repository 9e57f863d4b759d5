//! Detection failure handling.
//!
//! Counts consecutive failed detections and escalates in two stages.
//!
//! # State Machine
//!
//! ```text
//! Healthy --[failure]--> Failing(count)
//! Failing --[count ≥ warning_threshold]--> Warning
//! Warning --[count > error_threshold]--> Recovering (backoff, attempt n)
//! Recovering --[backoff elapsed, failure]--> Failing (count restarts)
//! any --[accepted detection]--> Healthy (count and attempts cleared)
//! Recovering --[attempt > max_recovery_attempts]--> Err(RecoveryExhausted)
//! ```
//!
//! The handler owns no timers. Backoff is an instant on the host's frame
//! timeline; frames stamped before it are ignored by the engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult, FrameIssue};
use crate::pose::Detection;

/// Configuration for failure escalation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureConfig {
    /// Consecutive failures that trigger the visibility warning (default: 5).
    pub warning_threshold: u32,
    /// Consecutive failures above which recovery is requested (default: 20).
    pub error_threshold: u32,
    /// Detections whose overall score is below this count as failures (default: 0.3).
    pub min_overall_confidence: f64,
    /// Backoff before the first retry (default: 1s).
    pub base_backoff: Duration,
    /// Added per further attempt (default: 250ms).
    pub backoff_step: Duration,
    /// Backoff cap (default: 1.5s).
    pub max_backoff: Duration,
    /// Recovery attempts before the failure becomes fatal (default: 3).
    pub max_recovery_attempts: u32,
}

impl Default for FailureConfig {
    fn default() -> Self {
        Self {
            warning_threshold: 5,
            error_threshold: 20,
            min_overall_confidence: 0.3,
            base_backoff: Duration::from_millis(1000),
            backoff_step: Duration::from_millis(250),
            max_backoff: Duration::from_millis(1500),
            max_recovery_attempts: 3,
        }
    }
}

impl FailureConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.warning_threshold == 0 {
            return Err("warning_threshold must be at least 1".to_string());
        }
        if self.error_threshold < self.warning_threshold {
            return Err(format!(
                "error_threshold ({}) must not be below warning_threshold ({})",
                self.error_threshold, self.warning_threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.min_overall_confidence) {
            return Err(format!(
                "min_overall_confidence must be between 0 and 1 (got {})",
                self.min_overall_confidence
            ));
        }
        if self.max_backoff < self.base_backoff {
            return Err("max_backoff must not be shorter than base_backoff".to_string());
        }
        Ok(())
    }

    /// Backoff for the given 1-based recovery attempt.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let extra = self.backoff_step.saturating_mul(attempt.saturating_sub(1));
        self.base_backoff.saturating_add(extra).min(self.max_backoff)
    }
}

/// Consecutive failure count and when the last one happened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureCounter {
    pub consecutive: u32,
    pub last_failure_ms: Option<u64>,
}

/// Request to the host to clear model buffers and retry later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryRequest {
    /// 1-based recovery attempt.
    pub attempt: u32,
    pub retry_after: Duration,
}

/// Outcome of recording one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Below the warning threshold.
    None,
    /// The user should be told the camera cannot see them.
    Warning,
    /// The host should reset the detector and back off.
    Recover(RecoveryRequest),
}

/// Tracks detection failures and decides when to escalate.
#[derive(Debug, Clone)]
pub struct FailureHandler {
    config: FailureConfig,
    counter: FailureCounter,
    attempts: u32,
    backoff_until_ms: Option<u64>,
}

impl FailureHandler {
    pub fn new(config: FailureConfig) -> Self {
        Self {
            config,
            counter: FailureCounter::default(),
            attempts: 0,
            backoff_until_ms: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(FailureConfig::default())
    }

    pub fn config(&self) -> &FailureConfig {
        &self.config
    }

    pub fn counter(&self) -> FailureCounter {
        self.counter
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.counter.consecutive
    }

    pub fn recovery_attempts(&self) -> u32 {
        self.attempts
    }

    /// Classifies a detection as accepted (`None`) or failed.
    pub fn assess(&self, detection: &Detection) -> Option<FrameIssue> {
        match detection {
            Detection::Failed { .. } => Some(FrameIssue::DetectionFailure),
            Detection::Pose(pose) if pose.keypoints.is_empty() => {
                Some(FrameIssue::DetectionFailure)
            }
            Detection::Pose(pose)
                if !(pose.overall_score >= self.config.min_overall_confidence) =>
            {
                Some(FrameIssue::LowConfidenceDetection)
            }
            Detection::Pose(_) => None,
        }
    }

    /// Whether a frame stamped `timestamp_ms` falls inside a recovery backoff.
    pub fn in_backoff(&self, timestamp_ms: u64) -> bool {
        self.backoff_until_ms
            .is_some_and(|until| timestamp_ms < until)
    }

    /// Records a failed detection. Issues that do not count as detection
    /// failures (see [`FrameIssue::counts_as_failure`]) leave the counter alone.
    ///
    /// # Errors
    ///
    /// [`EngineError::RecoveryExhausted`] once recovery has been requested
    /// `max_recovery_attempts` times without an accepted detection.
    pub fn record_failure(
        &mut self,
        timestamp_ms: u64,
        issue: FrameIssue,
    ) -> EngineResult<Escalation> {
        if !issue.counts_as_failure() {
            return Ok(Escalation::None);
        }
        self.counter.consecutive = self.counter.consecutive.saturating_add(1);
        self.counter.last_failure_ms = Some(timestamp_ms);
        let count = self.counter.consecutive;

        tracing::debug!(count, issue = %issue, "Detection failure recorded");

        if count > self.config.error_threshold {
            if self.attempts >= self.config.max_recovery_attempts {
                tracing::error!(
                    count,
                    attempts = self.attempts,
                    "Detection recovery exhausted"
                );
                return Err(EngineError::RecoveryExhausted {
                    attempts: self.attempts,
                });
            }

            self.attempts += 1;
            let retry_after = self.config.backoff_for(self.attempts);
            self.backoff_until_ms =
                Some(timestamp_ms.saturating_add(retry_after.as_millis() as u64));
            self.counter.consecutive = 0;

            tracing::warn!(
                count,
                attempt = self.attempts,
                retry_after_ms = retry_after.as_millis() as u64,
                "Detection failing, requesting recovery"
            );

            return Ok(Escalation::Recover(RecoveryRequest {
                attempt: self.attempts,
                retry_after,
            }));
        }

        if count >= self.config.warning_threshold {
            if count == self.config.warning_threshold {
                tracing::info!(count, "Detection degraded, warning user");
            }
            return Ok(Escalation::Warning);
        }

        Ok(Escalation::None)
    }

    /// Records an accepted detection, clearing the failure state.
    pub fn record_success(&mut self) {
        if self.counter.consecutive > 0 || self.attempts > 0 {
            tracing::info!(
                failures = self.counter.consecutive,
                attempts = self.attempts,
                "Detection recovered"
            );
        }
        self.counter = FailureCounter::default();
        self.attempts = 0;
        self.backoff_until_ms = None;
    }

    pub fn reset(&mut self) {
        self.counter = FailureCounter::default();
        self.attempts = 0;
        self.backoff_until_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{Keypoint, Landmark, PoseDetection};

    fn fail_n(handler: &mut FailureHandler, start_ms: u64, n: u32) -> Vec<Escalation> {
        (0..n)
            .map(|i| {
                handler
                    .record_failure(start_ms + i as u64 * 33, FrameIssue::DetectionFailure)
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = FailureConfig::default();
        assert_eq!(config.warning_threshold, 5);
        assert_eq!(config.error_threshold, 20);
        assert_eq!(config.max_recovery_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_detection_issues_are_not_counted() {
        let mut handler = FailureHandler::with_defaults();
        for issue in [
            FrameIssue::InsufficientKeypoints,
            FrameIssue::InvalidTransitionAttempt,
        ] {
            assert_eq!(handler.record_failure(0, issue).unwrap(), Escalation::None);
        }
        assert_eq!(handler.consecutive_failures(), 0);

        handler
            .record_failure(33, FrameIssue::LowConfidenceDetection)
            .unwrap();
        assert_eq!(handler.consecutive_failures(), 1);
    }

    #[test]
    fn test_backoff_schedule() {
        let config = FailureConfig::default();
        assert_eq!(config.backoff_for(1), Duration::from_millis(1000));
        assert_eq!(config.backoff_for(2), Duration::from_millis(1250));
        assert_eq!(config.backoff_for(3), Duration::from_millis(1500));
        assert_eq!(config.backoff_for(10), Duration::from_millis(1500));
    }

    #[test]
    fn test_assess_detection() {
        let handler = FailureHandler::with_defaults();
        let failed = Detection::Failed {
            reason: "model error".to_string(),
        };
        assert_eq!(handler.assess(&failed), Some(FrameIssue::DetectionFailure));

        let empty = Detection::Pose(PoseDetection::empty());
        assert_eq!(handler.assess(&empty), Some(FrameIssue::DetectionFailure));

        let keypoints = vec![Keypoint::new(Landmark::Nose, 0.5, 0.2, 0.9)];
        let weak = Detection::Pose(PoseDetection::new(keypoints.clone(), 0.1));
        assert_eq!(handler.assess(&weak), Some(FrameIssue::LowConfidenceDetection));

        let good = Detection::Pose(PoseDetection::new(keypoints, 0.8));
        assert_eq!(handler.assess(&good), None);
    }

    #[test]
    fn test_warning_on_fifth_failure() {
        let mut handler = FailureHandler::with_defaults();
        let escalations = fail_n(&mut handler, 0, 5);
        assert_eq!(escalations[3], Escalation::None);
        assert_eq!(escalations[4], Escalation::Warning);
        assert_eq!(handler.consecutive_failures(), 5);
    }

    #[test]
    fn test_success_resets_counter() {
        let mut handler = FailureHandler::with_defaults();
        fail_n(&mut handler, 0, 7);
        handler.record_success();
        assert_eq!(handler.consecutive_failures(), 0);
        assert_eq!(handler.counter().last_failure_ms, None);
    }

    #[test]
    fn test_recovery_requested_after_error_threshold() {
        let mut handler = FailureHandler::with_defaults();
        let escalations = fail_n(&mut handler, 0, 21);
        assert_eq!(escalations[19], Escalation::Warning);
        match escalations[20] {
            Escalation::Recover(request) => {
                assert_eq!(request.attempt, 1);
                assert_eq!(request.retry_after, Duration::from_millis(1000));
            }
            other => panic!("expected recovery, got {:?}", other),
        }
        // Frame 21 was stamped 660ms; backoff runs until 1660ms
        assert!(handler.in_backoff(1000));
        assert!(!handler.in_backoff(1660));
        assert_eq!(handler.consecutive_failures(), 0);
    }

    #[test]
    fn test_recovery_exhausted() {
        let mut handler = FailureHandler::with_defaults();
        let mut now = 0;
        for _ in 0..3 {
            fail_n(&mut handler, now, 21);
            now += 10_000;
        }
        assert_eq!(handler.recovery_attempts(), 3);

        fail_n(&mut handler, now, 20);
        let err = handler
            .record_failure(now + 5_000, FrameIssue::DetectionFailure)
            .unwrap_err();
        assert!(matches!(err, EngineError::RecoveryExhausted { attempts: 3 }));
    }

    #[test]
    fn test_success_clears_attempts() {
        let mut handler = FailureHandler::with_defaults();
        fail_n(&mut handler, 0, 21);
        handler.record_success();
        assert_eq!(handler.recovery_attempts(), 0);
        assert!(!handler.in_backoff(100));
    }

    #[test]
    fn test_invalid_config() {
        let config = FailureConfig {
            error_threshold: 2,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
