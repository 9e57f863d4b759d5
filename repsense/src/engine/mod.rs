//! The repetition engine.
//!
//! One [`Engine`] value is one exercise session. The host owns the tick and
//! calls [`Engine::process_frame`] once per detection result; the engine runs
//! the whole pipeline synchronously and returns an [`EngineOutput`].
//!
//! # Pipeline
//!
//! ```text
//! FrameResult
//!   ├─ stopped / stale generation ──► Discarded
//!   ├─ inside recovery backoff ─────► Backoff
//!   ├─ failed / empty / low score ──► FailureHandler ──► Warning | Recovery | Err
//!   └─ pose
//!        AngleExtractor ─► SignalSmoother ─► PhaseClassifier ─► RepetitionDetector
//!                                                                  │ boundary
//!                                              FormEvaluator ◄─────┘
//!                                                    │
//!                                           SessionAggregator ─► RepEvent + stats
//! ```
//!
//! Every processed frame also feeds the [`AdaptiveRateController`].

mod output;
mod shared;

pub use output::{EngineOutput, Feedback, FrameDisposition, Severity};
pub use shared::SharedEngine;

use crate::adaptive::AdaptiveRateController;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult, FrameIssue};
use crate::exercise::ExerciseProfile;
use crate::form::FormEvaluator;
use crate::kinematics::{AngleExtractor, SignalSmoother};
use crate::motion::{ExercisePhase, PhaseClassifier, PhaseStyle, RepetitionDetector};
use crate::pose::{Detection, FrameResult};
use crate::recovery::{Escalation, FailureHandler};
use crate::session::{RepEvent, SessionAggregator, SessionStats};

const VISIBILITY_ADVICE: &str = "Step back so your full body is visible";
const DETECTION_WARNING: &str = "Can't see you clearly. Check the lighting and stay in frame";
const RECOVERY_NOTICE: &str = "Tracking lost. Restarting pose detection";
const HOLD_GOOD: &str = "Good plank, hold it!";
const HOLD_BROKEN: &str = "Keep your hips in line with your shoulders";

/// One exercise session.
#[derive(Debug, Clone)]
pub struct Engine {
    profile: ExerciseProfile,
    config: EngineConfig,
    extractor: AngleExtractor,
    smoother: SignalSmoother,
    classifier: PhaseClassifier,
    detector: RepetitionDetector,
    evaluator: FormEvaluator,
    aggregator: SessionAggregator,
    rate: AdaptiveRateController,
    failures: FailureHandler,
    last_feedback: Option<Feedback>,
    hold_started_ms: Option<u64>,
    generation: u64,
    active: bool,
}

impl Engine {
    /// Starts a session.
    ///
    /// # Errors
    ///
    /// [`EngineError::Configuration`] if the profile or the engine
    /// configuration is invalid.
    pub fn new(profile: ExerciseProfile, config: EngineConfig) -> EngineResult<Self> {
        profile.validate()?;
        config.validate().map_err(EngineError::Configuration)?;

        tracing::info!(
            exercise = %profile.kind,
            primary_joint = %profile.primary_joint,
            high = profile.thresholds.high_deg,
            low = profile.thresholds.low_deg,
            window = profile.smoothing_window,
            "Exercise session started"
        );

        Ok(Self {
            extractor: AngleExtractor::new(profile.keypoint_confidence),
            smoother: SignalSmoother::new(profile.smoothing_window),
            classifier: PhaseClassifier::new(profile.style, profile.thresholds),
            detector: RepetitionDetector::new(profile.rep_pattern),
            evaluator: FormEvaluator::new(profile.rules.clone()),
            aggregator: SessionAggregator::new(),
            rate: AdaptiveRateController::new(config.rate.clone()),
            failures: FailureHandler::new(config.failure.clone()),
            last_feedback: None,
            hold_started_ms: None,
            generation: 0,
            active: true,
            profile,
            config,
        })
    }

    /// Starts a session for a built-in exercise with default settings.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownExercise`] if `name` is not a supported exercise.
    pub fn for_exercise(name: &str) -> EngineResult<Self> {
        Self::new(ExerciseProfile::by_name(name)?, EngineConfig::default())
    }

    pub fn profile(&self) -> &ExerciseProfile {
        &self.profile
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stats(&self) -> &SessionStats {
        self.aggregator.stats()
    }

    pub fn current_phase(&self) -> ExercisePhase {
        self.classifier.current_phase()
    }

    /// Session generation; bumped by [`reset_session`](Self::reset_session)
    /// and [`stop`](Self::stop).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn failure_count(&self) -> u32 {
        self.failures.consecutive_failures()
    }

    pub fn frame_skip(&self) -> u32 {
        self.rate.frame_skip()
    }

    pub fn rate_controller(&self) -> &AdaptiveRateController {
        &self.rate
    }

    /// Decides whether the host should run inference on the frame it just
    /// captured at `now_ms`.
    ///
    /// Call once per captured frame. Accounts for the adaptive frame skip and
    /// for recovery backoff.
    pub fn should_process_next(&mut self, now_ms: u64) -> bool {
        if !self.active || self.failures.in_backoff(now_ms) {
            return false;
        }
        self.rate.admit_frame()
    }

    /// Runs one detection result through the pipeline.
    ///
    /// # Errors
    ///
    /// [`EngineError::RecoveryExhausted`] when detections keep failing after
    /// every recovery attempt. All other frame problems are reported through
    /// [`EngineOutput::issue`] and feedback.
    pub fn process_frame(&mut self, frame: &FrameResult) -> EngineResult<EngineOutput> {
        let phase = self.classifier.current_phase();

        if !self.active {
            tracing::debug!(timestamp_ms = frame.timestamp_ms, "Session stopped, frame discarded");
            return Ok(EngineOutput::idle(phase, FrameDisposition::Discarded));
        }
        if let Some(generation) = frame.generation {
            if generation != self.generation {
                tracing::debug!(
                    frame_generation = generation,
                    current = self.generation,
                    "Stale frame discarded"
                );
                return Ok(EngineOutput::idle(phase, FrameDisposition::Discarded));
            }
        }
        if self.failures.in_backoff(frame.timestamp_ms) {
            return Ok(EngineOutput::idle(phase, FrameDisposition::Backoff));
        }

        self.rate.record_frame(frame.timestamp_ms, frame.latency_ms);

        let pose = match (&frame.detection, self.failures.assess(&frame.detection)) {
            (Detection::Pose(pose), None) => pose,
            (_, issue) => {
                let issue = issue.unwrap_or(FrameIssue::DetectionFailure);
                return self.handle_failure(frame.timestamp_ms, issue);
            }
        };
        self.failures.record_success();

        let keypoints = pose.keypoint_map();
        let raw = self.extractor.extract(&keypoints);
        let smoothed = self.smoother.push(&raw);
        let primary = self.profile.primary_joint;
        let classification = self.classifier.update(smoothed.get(primary));

        let mut output = EngineOutput::idle(classification.phase, FrameDisposition::Processed);
        output.issue = classification.issue;

        let mut candidate = match classification.issue {
            Some(FrameIssue::InsufficientKeypoints) => Some(Feedback::info(VISIBILITY_ADVICE)),
            _ => None,
        };

        if self.profile.style == PhaseStyle::Hold {
            if let Some(feedback) = self.track_hold(classification.phase, frame.timestamp_ms) {
                candidate.get_or_insert(feedback);
            }
        }

        if let Some(boundary) = self.detector.observe(
            classification.phase,
            &smoothed,
            raw.get(primary),
            frame.timestamp_ms,
        ) {
            let verdict = self.evaluator.evaluate(&boundary);
            let event = RepEvent {
                timestamp_ms: frame.timestamp_ms,
                exercise: self.profile.kind,
                rep_number: self.aggregator.stats().total_reps.saturating_add(1),
                is_good_form: verdict.is_good_form,
                quality_score: verdict.quality_score,
                violated_rules: verdict.violated_rules,
                range_of_motion: boundary.extrema.get(primary).span().unwrap_or(0.0),
                feedback: verdict.feedback,
            };
            let stats = self.aggregator.apply(&event).clone();

            tracing::info!(
                exercise = %event.exercise,
                rep = event.rep_number,
                good_form = event.is_good_form,
                score = event.quality_score,
                rom = format!("{:.1}", event.range_of_motion),
                accuracy = format!("{:.1}", stats.accuracy),
                "Repetition completed"
            );

            candidate = Some(if event.is_good_form && event.violated_rules.is_empty() {
                Feedback::success(format!("Rep {}: {}", event.rep_number, event.feedback))
            } else if event.is_good_form {
                Feedback::info(format!("Rep {}: {}", event.rep_number, event.feedback))
            } else {
                Feedback::warning(format!("Rep {}: {}", event.rep_number, event.feedback))
            });
            output.rep = Some(event);
            output.rep_angles = Some(boundary.extrema);
            output.stats = Some(stats);
        }

        output.feedback = self.emit(candidate);
        Ok(output)
    }

    fn handle_failure(&mut self, timestamp_ms: u64, issue: FrameIssue) -> EngineResult<EngineOutput> {
        self.hold_started_ms = None;

        let escalation = self.failures.record_failure(timestamp_ms, issue)?;

        let mut output = EngineOutput::idle(self.classifier.current_phase(), FrameDisposition::Processed);
        output.issue = Some(issue);

        let candidate = match escalation {
            Escalation::None => None,
            Escalation::Warning => Some(Feedback::warning(DETECTION_WARNING)),
            Escalation::Recover(request) => {
                // Stale samples would bias the first angles after recovery
                self.smoother.reset();
                output.recovery = Some(request);
                Some(Feedback::error(RECOVERY_NOTICE))
            }
        };
        output.feedback = self.emit(candidate);
        Ok(output)
    }

    /// Accumulates plank hold time and returns the hold feedback.
    fn track_hold(&mut self, phase: ExercisePhase, timestamp_ms: u64) -> Option<Feedback> {
        match phase {
            ExercisePhase::Holding => {
                if let Some(started) = self.hold_started_ms {
                    self.aggregator
                        .record_hold(timestamp_ms.saturating_sub(started));
                }
                self.hold_started_ms = Some(timestamp_ms);
                Some(Feedback::success(HOLD_GOOD))
            }
            ExercisePhase::Broken => {
                self.hold_started_ms = None;
                Some(Feedback::warning(HOLD_BROKEN))
            }
            _ => None,
        }
    }

    /// Returns the candidate only if it differs from the last emitted feedback.
    fn emit(&mut self, candidate: Option<Feedback>) -> Option<Feedback> {
        let feedback = candidate?;
        if self.last_feedback.as_ref() == Some(&feedback) {
            return None;
        }
        self.last_feedback = Some(feedback.clone());
        Some(feedback)
    }

    /// Zeroes statistics and returns every component to its initial state.
    ///
    /// Bumps the generation so results of inference requests issued before
    /// the reset are discarded.
    pub fn reset_session(&mut self) {
        self.smoother.reset();
        self.classifier.reset();
        self.detector.reset();
        self.aggregator.reset();
        self.rate.reset();
        self.failures.reset();
        self.last_feedback = None;
        self.hold_started_ms = None;
        self.generation = self.generation.wrapping_add(1);

        tracing::info!(
            exercise = %self.profile.kind,
            generation = self.generation,
            "Exercise session reset"
        );
    }

    /// Marks the session inactive. Later frames are discarded untouched.
    pub fn stop(&mut self) {
        if self.active {
            self.active = false;
            self.generation = self.generation.wrapping_add(1);
            tracing::info!(
                exercise = %self.profile.kind,
                reps = self.aggregator.stats().total_reps,
                "Exercise session stopped"
            );
        }
    }

    /// Resumes a stopped session with its statistics intact.
    pub fn start(&mut self) {
        if !self.active {
            self.active = true;
            self.hold_started_ms = None;
            tracing::info!(exercise = %self.profile.kind, "Exercise session resumed");
        }
    }
}
