//! Repetition boundary detection.
//!
//! The detector keeps only the last three distinct phases. When they spell
//! the exercise's [`RepPattern`] (by default `Bottom → Ascending → Standing`)
//! one repetition is complete. Requiring the intermediate phase means a
//! single noisy spike through `Bottom` cannot be counted twice, and a jump
//! straight from `Bottom` to `Standing` is never counted.
//!
//! Between boundaries the detector accumulates per-joint angle extrema and the
//! raw primary-joint trace. Both are handed over with the boundary and then
//! cleared for the next repetition. The trace keeps only the most recent
//! [`MAX_TRACE_SAMPLES`] angles, so a long idle stretch before a repetition
//! cannot push the repetition itself out of it.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::phase::{ExercisePhase, RepPattern};
use crate::kinematics::{Joint, JointAngleSet, JOINT_COUNT};

/// Upper bound on trace samples kept for one repetition; older samples are evicted.
pub const MAX_TRACE_SAMPLES: usize = 900;

/// Minimum and maximum of one joint's angle over a repetition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AngleExtrema {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl AngleExtrema {
    pub fn record(&mut self, angle: f64) {
        self.min = Some(self.min.map_or(angle, |m| m.min(angle)));
        self.max = Some(self.max.map_or(angle, |m| m.max(angle)));
    }

    /// `max - min`, if any sample was recorded.
    pub fn span(&self) -> Option<f64> {
        match (self.min, self.max) {
            (Some(min), Some(max)) => Some(max - min),
            _ => None,
        }
    }
}

/// Extrema of every joint over a repetition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JointExtrema {
    joints: [AngleExtrema; JOINT_COUNT],
}

impl JointExtrema {
    pub fn get(&self, joint: Joint) -> AngleExtrema {
        self.joints[joint.index()]
    }

    /// Folds one frame of angles into the extrema.
    pub fn record(&mut self, angles: &JointAngleSet) {
        for (joint, angle) in angles.iter() {
            if let Some(angle) = angle.filter(|a| a.is_finite()) {
                self.joints[joint.index()].record(angle);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Joint, AngleExtrema)> + '_ {
        Joint::ALL.iter().map(move |j| (*j, self.get(*j)))
    }
}

/// Everything observed during one completed repetition.
#[derive(Debug, Clone, PartialEq)]
pub struct RepBoundary {
    /// Timestamp of the first frame after the previous boundary.
    pub started_at_ms: u64,
    /// Timestamp of the frame that completed the repetition.
    pub ended_at_ms: u64,
    /// Smoothed angle extrema per joint.
    pub extrema: JointExtrema,
    /// Raw primary-joint angles, in frame order.
    pub trace: Vec<f64>,
}

impl RepBoundary {
    pub fn duration_ms(&self) -> u64 {
        self.ended_at_ms.saturating_sub(self.started_at_ms)
    }
}

/// Watches phase sequences and emits repetition boundaries.
#[derive(Debug, Clone)]
pub struct RepetitionDetector {
    pattern: Option<RepPattern>,
    history: VecDeque<ExercisePhase>,
    extrema: JointExtrema,
    trace: VecDeque<f64>,
    started_at_ms: Option<u64>,
}

impl RepetitionDetector {
    /// Creates a detector. Without a pattern no repetition is ever emitted.
    pub fn new(pattern: Option<RepPattern>) -> Self {
        Self {
            pattern,
            history: VecDeque::with_capacity(3),
            extrema: JointExtrema::default(),
            trace: VecDeque::new(),
            started_at_ms: None,
        }
    }

    pub fn pattern(&self) -> Option<RepPattern> {
        self.pattern
    }

    /// Last distinct phases, oldest first.
    pub fn history(&self) -> Vec<ExercisePhase> {
        self.history.iter().copied().collect()
    }

    /// Observes one classified frame.
    ///
    /// # Arguments
    ///
    /// * `phase` - Phase after this frame
    /// * `smoothed` - Smoothed angles of this frame (for extrema)
    /// * `raw_primary` - Raw primary-joint angle of this frame (for the trace)
    /// * `timestamp_ms` - Host timestamp of this frame
    ///
    /// # Returns
    ///
    /// `Some(RepBoundary)` if this frame completed a repetition.
    pub fn observe(
        &mut self,
        phase: ExercisePhase,
        smoothed: &JointAngleSet,
        raw_primary: Option<f64>,
        timestamp_ms: u64,
    ) -> Option<RepBoundary> {
        self.started_at_ms.get_or_insert(timestamp_ms);
        self.extrema.record(smoothed);
        if let Some(angle) = raw_primary.filter(|a| a.is_finite()) {
            if self.trace.len() == MAX_TRACE_SAMPLES {
                self.trace.pop_front();
            }
            self.trace.push_back(angle);
        }

        if self.history.back() == Some(&phase) {
            return None;
        }
        self.history.push_back(phase);
        while self.history.len() > 3 {
            self.history.pop_front();
        }

        let pattern = self.pattern?;
        if !pattern.matches(self.history.make_contiguous()) {
            return None;
        }

        let boundary = RepBoundary {
            started_at_ms: self.started_at_ms.unwrap_or(timestamp_ms),
            ended_at_ms: timestamp_ms,
            extrema: std::mem::take(&mut self.extrema),
            trace: Vec::from(std::mem::take(&mut self.trace)),
        };
        self.started_at_ms = Some(timestamp_ms);

        tracing::debug!(
            duration_ms = boundary.duration_ms(),
            samples = boundary.trace.len(),
            "Repetition boundary detected"
        );

        Some(boundary)
    }

    /// Clears phase history and the in-progress repetition.
    pub fn reset(&mut self) {
        self.history.clear();
        self.extrema = JointExtrema::default();
        self.trace.clear();
        self.started_at_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ExercisePhase::*;

    fn knee(angle: f64) -> JointAngleSet {
        JointAngleSet::empty().with(Joint::Knee, Some(angle))
    }

    fn feed(detector: &mut RepetitionDetector, phases: &[(ExercisePhase, f64)]) -> usize {
        phases
            .iter()
            .enumerate()
            .filter_map(|(i, (phase, angle))| {
                detector.observe(*phase, &knee(*angle), Some(*angle), i as u64 * 33)
            })
            .count()
    }

    #[test]
    fn test_canonical_sequence_counts_once() {
        let mut detector = RepetitionDetector::new(Some(RepPattern::canonical()));
        let reps = feed(
            &mut detector,
            &[
                (Standing, 170.0),
                (Descending, 140.0),
                (Bottom, 90.0),
                (Bottom, 88.0),
                (Ascending, 130.0),
                (Standing, 170.0),
                (Standing, 171.0),
            ],
        );
        assert_eq!(reps, 1);
    }

    #[test]
    fn test_bottom_to_standing_does_not_count() {
        let mut detector = RepetitionDetector::new(Some(RepPattern::canonical()));
        let reps = feed(
            &mut detector,
            &[(Standing, 170.0), (Bottom, 90.0), (Standing, 170.0)],
        );
        assert_eq!(reps, 0);
    }

    #[test]
    fn test_two_reps_count_twice() {
        let mut detector = RepetitionDetector::new(Some(RepPattern::canonical()));
        let cycle = [
            (Descending, 140.0),
            (Bottom, 90.0),
            (Ascending, 130.0),
            (Standing, 170.0),
        ];
        let mut phases = vec![(Standing, 170.0)];
        phases.extend_from_slice(&cycle);
        phases.extend_from_slice(&cycle);
        assert_eq!(feed(&mut detector, &phases), 2);
    }

    #[test]
    fn test_boundary_carries_extrema_and_clears() {
        let mut detector = RepetitionDetector::new(Some(RepPattern::canonical()));
        detector.observe(Standing, &knee(170.0), Some(170.0), 0);
        detector.observe(Bottom, &knee(85.0), Some(85.0), 500);
        detector.observe(Ascending, &knee(120.0), Some(120.0), 1000);
        let boundary = detector
            .observe(Standing, &knee(168.0), Some(168.0), 1500)
            .unwrap();

        let knee_extrema = boundary.extrema.get(Joint::Knee);
        assert_eq!(knee_extrema.min, Some(85.0));
        assert_eq!(knee_extrema.max, Some(170.0));
        assert_eq!(knee_extrema.span(), Some(85.0));
        assert_eq!(boundary.trace, vec![170.0, 85.0, 120.0, 168.0]);
        assert_eq!(boundary.duration_ms(), 1500);

        // Next repetition starts from an empty buffer
        detector.observe(Descending, &knee(150.0), Some(150.0), 2000);
        detector.observe(Bottom, &knee(95.0), Some(95.0), 2500);
        detector.observe(Ascending, &knee(125.0), Some(125.0), 3000);
        let boundary = detector
            .observe(Standing, &knee(165.0), Some(165.0), 3500)
            .unwrap();
        assert_eq!(boundary.extrema.get(Joint::Knee).max, Some(165.0));
        assert_eq!(boundary.started_at_ms, 1500);
    }

    #[test]
    fn test_no_pattern_never_emits() {
        let mut detector = RepetitionDetector::new(None);
        let reps = feed(
            &mut detector,
            &[(Bottom, 90.0), (Ascending, 130.0), (Standing, 170.0)],
        );
        assert_eq!(reps, 0);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut detector = RepetitionDetector::new(Some(RepPattern::canonical()));
        feed(
            &mut detector,
            &[
                (Standing, 170.0),
                (Descending, 140.0),
                (Bottom, 90.0),
                (Ascending, 130.0),
            ],
        );
        assert_eq!(detector.history(), vec![Descending, Bottom, Ascending]);
    }

    #[test]
    fn test_reset_drops_in_progress_rep() {
        let mut detector = RepetitionDetector::new(Some(RepPattern::canonical()));
        feed(&mut detector, &[(Bottom, 90.0), (Ascending, 130.0)]);
        detector.reset();
        assert!(detector.history().is_empty());
        assert!(detector
            .observe(Standing, &knee(170.0), Some(170.0), 0)
            .is_none());
    }

    #[test]
    fn test_trace_is_bounded() {
        let mut detector = RepetitionDetector::new(Some(RepPattern::canonical()));
        for i in 0..(MAX_TRACE_SAMPLES + 50) {
            detector.observe(Standing, &knee(170.0), Some(170.0), i as u64);
        }
        detector.observe(Bottom, &knee(90.0), Some(90.0), 10_000);
        detector.observe(Ascending, &knee(130.0), Some(130.0), 10_001);
        let boundary = detector
            .observe(Standing, &knee(170.0), Some(170.0), 10_002)
            .unwrap();
        assert_eq!(boundary.trace.len(), MAX_TRACE_SAMPLES);
        assert_eq!(&boundary.trace[MAX_TRACE_SAMPLES - 3..], &[90.0, 130.0, 170.0]);
    }

    #[test]
    fn test_long_idle_does_not_hide_jerky_rep() {
        let mut detector = RepetitionDetector::new(Some(RepPattern::canonical()));
        for i in 0..1000u64 {
            detector.observe(Standing, &knee(170.0), Some(170.0), i * 33);
        }
        let rep = [
            (Descending, 140.0),
            (Bottom, 90.0),
            (Bottom, 150.0),
            (Bottom, 90.0),
            (Ascending, 130.0),
        ];
        for (i, (phase, angle)) in rep.iter().enumerate() {
            detector.observe(*phase, &knee(*angle), Some(*angle), 40_000 + i as u64 * 33);
        }
        let boundary = detector
            .observe(Standing, &knee(170.0), Some(170.0), 41_000)
            .unwrap();

        assert_eq!(boundary.trace.len(), MAX_TRACE_SAMPLES);
        assert_eq!(boundary.trace.last(), Some(&170.0));
        assert!(crate::form::max_second_difference(&boundary.trace) >= 120.0);
    }
}
