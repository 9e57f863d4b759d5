//! Adaptive frame-rate control.
//!
//! Watches per-frame latency and adjusts how many captured frames are skipped
//! between processed ones.
//!
//! # Detection Logic
//!
//! ```text
//! ema     = α × latency + (1 − α) × ema          (α = 0.2)
//! fps     = 1000 / ema
//!
//! fps < min_fps for more than slow_run_frames  → skip + 1  (≤ max_skip)
//! fps > max_fps for more than fast_run_frames  → skip − 1  (≥ 1)
//! ```
//!
//! Adjustments happen at most once per `evaluation_interval`, measured on the
//! host's frame timestamps. Latency is the host-reported inference latency
//! when present; otherwise the interval between consecutive processed frames
//! divided by the number of frames captured in between.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Largest frame skip the controller will ever apply.
pub const MAX_FRAME_SKIP: u32 = 4;

/// Configuration for the adaptive rate controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateControlConfig {
    /// Smoothing factor of the latency average (default: 0.2).
    pub ema_alpha: f64,
    /// Below this implied FPS frames are slow (default: 15).
    pub min_fps: f64,
    /// Above this implied FPS frames are fast (default: 25).
    pub max_fps: f64,
    /// Upper bound on frame skip, at most [`MAX_FRAME_SKIP`] (default: 4).
    pub max_skip: u32,
    /// Slow frames in a row required before skipping more (default: 10).
    pub slow_run_frames: u32,
    /// Fast frames in a row required before skipping less (default: 30).
    pub fast_run_frames: u32,
    /// Minimum time between two adjustments (default: 5s).
    pub evaluation_interval: Duration,
    /// Samples kept in the performance window (default: 30).
    pub window_capacity: usize,
}

impl Default for RateControlConfig {
    fn default() -> Self {
        Self {
            ema_alpha: 0.2,
            min_fps: 15.0,
            max_fps: 25.0,
            max_skip: 4,
            slow_run_frames: 10,
            fast_run_frames: 30,
            evaluation_interval: Duration::from_secs(5),
            window_capacity: 30,
        }
    }
}

impl RateControlConfig {
    /// Checks the configuration before a session starts.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.ema_alpha > 0.0 && self.ema_alpha <= 1.0) {
            return Err(format!("ema_alpha must be in (0, 1] (got {})", self.ema_alpha));
        }
        if !(self.min_fps > 0.0 && self.min_fps < self.max_fps) {
            return Err(format!(
                "min_fps ({}) must be positive and below max_fps ({})",
                self.min_fps, self.max_fps
            ));
        }
        if self.max_skip == 0 || self.max_skip > MAX_FRAME_SKIP {
            return Err(format!(
                "max_skip must be between 1 and {} (got {})",
                MAX_FRAME_SKIP, self.max_skip
            ));
        }
        if self.window_capacity == 0 {
            return Err("window_capacity must be at least 1".to_string());
        }
        Ok(())
    }
}

/// One latency observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSample {
    pub timestamp_ms: u64,
    pub latency_ms: f64,
}

/// Ring buffer of recent frame samples.
#[derive(Debug, Clone)]
pub struct PerformanceWindow {
    samples: VecDeque<FrameSample>,
    capacity: usize,
}

impl PerformanceWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Adds a sample, evicting the oldest when full.
    pub fn push(&mut self, sample: FrameSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Plain mean latency over the window.
    pub fn mean_latency_ms(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: f64 = self.samples.iter().map(|s| s.latency_ms).sum();
        Some(sum / self.samples.len() as f64)
    }

    /// Worst latency in the window.
    pub fn peak_latency_ms(&self) -> Option<f64> {
        self.samples.iter().map(|s| s.latency_ms).reduce(f64::max)
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// A change of frame skip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateAdjustment {
    pub from_skip: u32,
    pub to_skip: u32,
    pub implied_fps: f64,
}

/// Additive-increase/additive-decrease frame skip controller.
#[derive(Debug, Clone)]
pub struct AdaptiveRateController {
    config: RateControlConfig,
    window: PerformanceWindow,
    ema_latency_ms: Option<f64>,
    frame_skip: u32,
    slow_run: u32,
    fast_run: u32,
    last_adjustment_ms: Option<u64>,
    last_processed_ms: Option<u64>,
    /// Frames seen by `admit_frame` since the last recorded one.
    captured_since_processed: u32,
    cadence: u64,
}

impl AdaptiveRateController {
    pub fn new(config: RateControlConfig) -> Self {
        Self {
            window: PerformanceWindow::new(config.window_capacity),
            config,
            ema_latency_ms: None,
            frame_skip: 1,
            slow_run: 0,
            fast_run: 0,
            last_adjustment_ms: None,
            last_processed_ms: None,
            captured_since_processed: 0,
            cadence: 0,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RateControlConfig::default())
    }

    pub fn config(&self) -> &RateControlConfig {
        &self.config
    }

    /// Process one of every `frame_skip` captured frames.
    pub fn frame_skip(&self) -> u32 {
        self.frame_skip
    }

    pub fn ema_latency_ms(&self) -> Option<f64> {
        self.ema_latency_ms
    }

    pub fn implied_fps(&self) -> Option<f64> {
        self.ema_latency_ms.map(implied_fps)
    }

    pub fn window(&self) -> &PerformanceWindow {
        &self.window
    }

    /// Advances the capture cadence by one frame.
    ///
    /// Returns `true` when this captured frame should be processed.
    pub fn admit_frame(&mut self) -> bool {
        let admit = self.cadence % self.frame_skip as u64 == 0;
        self.cadence = self.cadence.wrapping_add(1);
        self.captured_since_processed = self.captured_since_processed.saturating_add(1);
        admit
    }

    /// Records the timing of a processed frame.
    ///
    /// # Returns
    ///
    /// `Some(RateAdjustment)` if the frame skip changed.
    pub fn record_frame(
        &mut self,
        timestamp_ms: u64,
        latency_ms: Option<f64>,
    ) -> Option<RateAdjustment> {
        let captured = self.captured_since_processed.max(1);
        self.captured_since_processed = 0;

        let interval = self
            .last_processed_ms
            .map(|last| timestamp_ms.saturating_sub(last) as f64 / captured as f64);
        self.last_processed_ms = Some(timestamp_ms);

        let latency = latency_ms
            .filter(|l| l.is_finite() && *l >= 0.0)
            .or(interval)?;

        let ema = match self.ema_latency_ms {
            Some(ema) => self.config.ema_alpha * latency + (1.0 - self.config.ema_alpha) * ema,
            None => latency,
        };
        self.ema_latency_ms = Some(ema);
        self.window.push(FrameSample {
            timestamp_ms,
            latency_ms: latency,
        });

        let fps = implied_fps(ema);
        if fps < self.config.min_fps {
            self.slow_run = self.slow_run.saturating_add(1);
            self.fast_run = 0;
        } else if fps > self.config.max_fps {
            self.fast_run = self.fast_run.saturating_add(1);
            self.slow_run = 0;
        } else {
            self.slow_run = 0;
            self.fast_run = 0;
        }

        tracing::trace!(
            latency_ms = format!("{:.1}", latency),
            ema_ms = format!("{:.1}", ema),
            fps = format!("{:.1}", fps),
            slow_run = self.slow_run,
            fast_run = self.fast_run,
            "Frame timing recorded"
        );

        self.evaluate(timestamp_ms, fps)
    }

    fn evaluate(&mut self, timestamp_ms: u64, fps: f64) -> Option<RateAdjustment> {
        if let Some(last) = self.last_adjustment_ms {
            let elapsed = Duration::from_millis(timestamp_ms.saturating_sub(last));
            if elapsed < self.config.evaluation_interval {
                return None;
            }
        }

        let current = self.frame_skip;
        let target = if self.slow_run > self.config.slow_run_frames {
            (current + 1).min(self.config.max_skip.clamp(1, MAX_FRAME_SKIP))
        } else if self.fast_run > self.config.fast_run_frames {
            current.saturating_sub(1).max(1)
        } else {
            return None;
        };

        if target == current {
            return None;
        }

        let direction = if target > current {
            "increasing frame skip"
        } else {
            "decreasing frame skip"
        };
        tracing::info!(
            from = current,
            to = target,
            fps = format!("{:.1}", fps),
            "Adaptive rate: {}",
            direction
        );

        self.frame_skip = target;
        self.slow_run = 0;
        self.fast_run = 0;
        self.last_adjustment_ms = Some(timestamp_ms);
        self.cadence = 0;

        Some(RateAdjustment {
            from_skip: current,
            to_skip: target,
            implied_fps: fps,
        })
    }

    /// Returns to full rate and forgets all timing history.
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}

fn implied_fps(latency_ms: f64) -> f64 {
    if latency_ms > 0.0 {
        1000.0 / latency_ms
    } else {
        f64::INFINITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feeds `count` frames with a fixed latency, one frame every `step_ms`.
    fn feed(
        controller: &mut AdaptiveRateController,
        start_ms: u64,
        count: u64,
        step_ms: u64,
        latency_ms: f64,
    ) -> Vec<RateAdjustment> {
        (0..count)
            .filter_map(|i| controller.record_frame(start_ms + i * step_ms, Some(latency_ms)))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = RateControlConfig::default();
        assert_eq!(config.ema_alpha, 0.2);
        assert_eq!(config.min_fps, 15.0);
        assert_eq!(config.max_fps, 25.0);
        assert_eq!(config.max_skip, 4);
        assert_eq!(config.evaluation_interval, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let config = RateControlConfig {
            min_fps: 30.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RateControlConfig {
            ema_alpha: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_starts_at_full_rate() {
        let controller = AdaptiveRateController::with_defaults();
        assert_eq!(controller.frame_skip(), 1);
        assert!(controller.ema_latency_ms().is_none());
    }

    #[test]
    fn test_slow_frames_increase_skip_after_run() {
        let mut controller = AdaptiveRateController::with_defaults();
        // 100ms latency = 10 fps, below the 15 fps floor
        let adjustments = feed(&mut controller, 0, 10, 100, 100.0);
        assert!(adjustments.is_empty(), "needs more than 10 slow frames");

        let adjustment = controller.record_frame(1000, Some(100.0)).unwrap();
        assert_eq!(adjustment.from_skip, 1);
        assert_eq!(adjustment.to_skip, 2);
        assert_eq!(controller.frame_skip(), 2);
    }

    #[test]
    fn test_adjustments_rate_limited() {
        let mut controller = AdaptiveRateController::with_defaults();
        let adjustments = feed(&mut controller, 0, 40, 100, 100.0);
        // 4 seconds of slow frames: only the first adjustment fires
        assert_eq!(adjustments.len(), 1);

        // Next adjustment becomes possible 5s after the first one
        let adjustments = feed(&mut controller, 4000, 30, 100, 100.0);
        assert_eq!(adjustments.len(), 1);
        assert_eq!(controller.frame_skip(), 3);
    }

    #[test]
    fn test_skip_capped_at_max() {
        let mut controller = AdaptiveRateController::with_defaults();
        feed(&mut controller, 0, 1000, 100, 200.0);
        assert_eq!(controller.frame_skip(), 4);
    }

    #[test]
    fn test_oversized_max_skip_rejected_and_never_applied() {
        let config = RateControlConfig {
            max_skip: 10,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("max_skip"));

        // Even when built without validation the skip stays within bounds
        let mut controller = AdaptiveRateController::new(config);
        feed(&mut controller, 0, 2000, 300, 300.0);
        assert_eq!(controller.frame_skip(), MAX_FRAME_SKIP);
    }

    #[test]
    fn test_fast_frames_decrease_skip() {
        let mut controller = AdaptiveRateController::with_defaults();
        feed(&mut controller, 0, 11, 100, 100.0);
        assert_eq!(controller.frame_skip(), 2);

        // 20ms latency = 50 fps; ema needs a few frames to cross 25 fps
        let adjustments = feed(&mut controller, 6000, 60, 100, 20.0);
        assert_eq!(adjustments.len(), 1);
        assert_eq!(controller.frame_skip(), 1);
    }

    #[test]
    fn test_normal_rate_is_stable() {
        let mut controller = AdaptiveRateController::with_defaults();
        // 50ms = 20 fps, inside the band
        let adjustments = feed(&mut controller, 0, 500, 50, 50.0);
        assert!(adjustments.is_empty());
        assert_eq!(controller.frame_skip(), 1);
    }

    #[test]
    fn test_interval_fallback() {
        let mut controller = AdaptiveRateController::with_defaults();
        assert!(controller.record_frame(0, None).is_none());
        assert!(controller.ema_latency_ms().is_none());
        controller.record_frame(40, None);
        assert_eq!(controller.ema_latency_ms(), Some(40.0));
    }

    #[test]
    fn test_interval_divided_by_captured_frames() {
        let mut controller = AdaptiveRateController::with_defaults();
        assert!(controller.admit_frame());
        controller.record_frame(0, None);
        controller.admit_frame();
        controller.admit_frame();
        controller.record_frame(80, None);
        assert_eq!(controller.ema_latency_ms(), Some(40.0));
    }

    #[test]
    fn test_admit_follows_skip() {
        let mut controller = AdaptiveRateController::with_defaults();
        feed(&mut controller, 0, 11, 100, 100.0);
        assert_eq!(controller.frame_skip(), 2);

        let admitted: Vec<bool> = (0..6).map(|_| controller.admit_frame()).collect();
        assert_eq!(admitted, vec![true, false, true, false, true, false]);
    }

    #[test]
    fn test_performance_window_bounded() {
        let mut window = PerformanceWindow::new(3);
        for i in 0..5 {
            window.push(FrameSample {
                timestamp_ms: i,
                latency_ms: i as f64 * 10.0,
            });
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.mean_latency_ms(), Some(30.0));
        assert_eq!(window.peak_latency_ms(), Some(40.0));
    }

    #[test]
    fn test_reset() {
        let mut controller = AdaptiveRateController::with_defaults();
        feed(&mut controller, 0, 11, 100, 100.0);
        controller.reset();
        assert_eq!(controller.frame_skip(), 1);
        assert!(controller.window().is_empty());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_skip_always_in_bounds(
                frames in proptest::collection::vec(
                    (1u64..500, proptest::option::of(0.0..1000.0_f64)),
                    1..2000
                ),
            ) {
                let mut controller = AdaptiveRateController::with_defaults();
                let mut now = 0u64;
                for (step, latency) in frames {
                    now += step;
                    controller.admit_frame();
                    controller.record_frame(now, latency);
                    let skip = controller.frame_skip();
                    prop_assert!((1..=4).contains(&skip));
                }
            }
        }
    }
}
