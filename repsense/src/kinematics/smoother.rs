//! Moving-window smoothing of joint angles.
//!
//! Raw per-frame angles jitter with the detector. Each joint keeps a FIFO
//! window of its most recent samples and reports their arithmetic mean, so
//! the phase classifier sees a stable signal.
//!
//! Absent samples occupy a slot in the window but do not contribute to the
//! mean. A window holding only absent samples reports absent: the smoother
//! never invents a value, and a joint that disappears for a full window goes
//! stale instead of repeating an old reading.

use std::collections::VecDeque;

use super::angles::{Joint, JointAngleSet, JOINT_COUNT};

/// Default number of samples per joint window.
pub const DEFAULT_WINDOW: usize = 5;

/// Largest permitted window.
pub const MAX_WINDOW: usize = 30;

/// Per-joint moving-average filter.
#[derive(Debug, Clone)]
pub struct SignalSmoother {
    capacity: usize,
    windows: [VecDeque<Option<f64>>; JOINT_COUNT],
}

impl SignalSmoother {
    /// Creates a smoother; `capacity` is clamped to `1..=MAX_WINDOW`.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_WINDOW);
        Self {
            capacity,
            windows: std::array::from_fn(|_| VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pushes one frame of raw angles and returns the smoothed set.
    pub fn push(&mut self, raw: &JointAngleSet) -> JointAngleSet {
        let mut smoothed = JointAngleSet::empty();
        for joint in Joint::ALL {
            let window = &mut self.windows[joint.index()];
            window.push_back(raw.get(joint).filter(|a| a.is_finite()));
            while window.len() > self.capacity {
                window.pop_front();
            }
            smoothed = smoothed.with(joint, mean(window));
        }
        smoothed
    }

    /// Current smoothed value for one joint.
    pub fn value(&self, joint: Joint) -> Option<f64> {
        mean(&self.windows[joint.index()])
    }

    /// Number of frames currently held for `joint`, present or not.
    pub fn window_len(&self, joint: Joint) -> usize {
        self.windows[joint.index()].len()
    }

    /// Drops every sample.
    pub fn reset(&mut self) {
        for window in &mut self.windows {
            window.clear();
        }
    }
}

impl Default for SignalSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

fn mean(window: &VecDeque<Option<f64>>) -> Option<f64> {
    let (sum, count) = window
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
