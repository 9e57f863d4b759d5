//! Session statistics.
//!
//! The aggregator is a pure reducer over [`RepEvent`]s. Accuracy and the mean
//! range of motion are recomputed from integer counts and an exact running sum
//! on every event, so repeated updates never accumulate rounding drift.

use serde::{Deserialize, Serialize};

use super::event::RepEvent;

/// Minimum, maximum and mean primary-joint span over the session's reps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeOfMotion {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

/// Aggregate counters for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_reps: u32,
    pub good_reps: u32,
    pub bad_reps: u32,
    /// `good_reps / total_reps × 100`, 0 before the first rep.
    pub accuracy: f64,
    pub current_streak: u32,
    pub best_streak: u32,
    pub range_of_motion: RangeOfMotion,
    /// Time spent in a correct hold (plank).
    pub hold_time_ms: u64,
}

impl SessionStats {
    /// Accuracy rounded for display.
    pub fn accuracy_display(&self) -> String {
        format!("{:.1}%", self.accuracy)
    }
}

/// Folds repetition events into [`SessionStats`].
#[derive(Debug, Clone, Default)]
pub struct SessionAggregator {
    stats: SessionStats,
    range_sum: f64,
}

impl SessionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Applies one repetition event.
    pub fn apply(&mut self, event: &RepEvent) -> &SessionStats {
        let stats = &mut self.stats;

        stats.total_reps = stats.total_reps.saturating_add(1);
        if event.is_good_form {
            stats.good_reps = stats.good_reps.saturating_add(1);
            stats.current_streak = stats.current_streak.saturating_add(1);
            stats.best_streak = stats.best_streak.max(stats.current_streak);
        } else {
            stats.bad_reps = stats.bad_reps.saturating_add(1);
            stats.current_streak = 0;
        }
        stats.accuracy = stats.good_reps as f64 / stats.total_reps as f64 * 100.0;

        let span = if event.range_of_motion.is_finite() {
            event.range_of_motion.max(0.0)
        } else {
            0.0
        };
        let rom = &mut stats.range_of_motion;
        if stats.total_reps == 1 {
            rom.min = span;
            rom.max = span;
        } else {
            rom.min = rom.min.min(span);
            rom.max = rom.max.max(span);
        }
        self.range_sum += span;
        rom.avg = self.range_sum / stats.total_reps as f64;

        &self.stats
    }

    /// Adds time spent in a correct hold.
    pub fn record_hold(&mut self, duration_ms: u64) {
        self.stats.hold_time_ms = self.stats.hold_time_ms.saturating_add(duration_ms);
    }

    /// Zeroes every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
