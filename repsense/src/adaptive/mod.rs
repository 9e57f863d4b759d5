//! Adaptive frame-rate and backpressure control.
//!
//! The controller never blocks and owns no timers; it only reacts to the
//! timestamps carried by processed frames.

mod rate_controller;

pub use rate_controller::{
    AdaptiveRateController, FrameSample, PerformanceWindow, RateAdjustment, RateControlConfig,
    MAX_FRAME_SKIP,
};
