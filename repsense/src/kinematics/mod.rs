//! Joint geometry and signal conditioning.
//!
//! ```text
//! KeypointMap ──► AngleExtractor ──► JointAngleSet (raw) ──► SignalSmoother ──► JointAngleSet (smoothed)
//! ```

mod angles;
mod smoother;

pub use angles::{
    angle_at, AngleExtractor, Joint, JointAngleSet, DEFAULT_KEYPOINT_CONFIDENCE, JOINT_COUNT,
};
pub use smoother::{SignalSmoother, DEFAULT_WINDOW, MAX_WINDOW};
