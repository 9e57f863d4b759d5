//! Joint angle extraction.
//!
//! The angle at joint B between landmarks A (proximal) and C (distal) is
//!
//! ```text
//! angle = acos(clamp((BA · BC) / (|BA| |BC|), -1, 1)) * 180 / π
//! ```
//!
//! which always lies in [0°, 180°]. A joint whose landmarks are missing or
//! below the confidence threshold has no angle; callers must read that as
//! "insufficient evidence", never as zero.
//!
//! # Joints
//!
//! | Joint    | A        | B        | C                       |
//! |----------|----------|----------|-------------------------|
//! | knee     | hip      | knee     | ankle                   |
//! | hip      | shoulder | hip      | knee                    |
//! | shoulder | elbow    | shoulder | hip                     |
//! | elbow    | shoulder | elbow    | wrist                   |
//! | ankle    | knee     | ankle    | point straight below    |
//! | neck     | ear      | shoulder | hip                     |
//!
//! Each joint is measured on both sides of the body. The side whose weakest
//! landmark is more confident is used.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pose::{Keypoint, KeypointMap, Landmark};

/// Segments shorter than this (normalized units) are treated as degenerate.
const MIN_SEGMENT_LENGTH: f64 = 1e-6;

/// Default minimum keypoint confidence for angle extraction.
pub const DEFAULT_KEYPOINT_CONFIDENCE: f64 = 0.3;

/// Number of tracked joints.
pub const JOINT_COUNT: usize = 6;

/// A tracked joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    Knee,
    Hip,
    Shoulder,
    Elbow,
    Ankle,
    Neck,
}

impl Joint {
    pub const ALL: [Joint; JOINT_COUNT] = [
        Joint::Knee,
        Joint::Hip,
        Joint::Shoulder,
        Joint::Elbow,
        Joint::Ankle,
        Joint::Neck,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Joint::Knee => "knee",
            Joint::Hip => "hip",
            Joint::Shoulder => "shoulder",
            Joint::Elbow => "elbow",
            Joint::Ankle => "ankle",
            Joint::Neck => "neck",
        }
    }

    /// Landmarks `(A, B, C)` for each side. `C` is `None` for the ankle,
    /// whose distal reference is synthesized below the joint.
    fn landmarks(self) -> [(Landmark, Landmark, Option<Landmark>); 2] {
        use Landmark::*;
        match self {
            Joint::Knee => [
                (LeftHip, LeftKnee, Some(LeftAnkle)),
                (RightHip, RightKnee, Some(RightAnkle)),
            ],
            Joint::Hip => [
                (LeftShoulder, LeftHip, Some(LeftKnee)),
                (RightShoulder, RightHip, Some(RightKnee)),
            ],
            Joint::Shoulder => [
                (LeftElbow, LeftShoulder, Some(LeftHip)),
                (RightElbow, RightShoulder, Some(RightHip)),
            ],
            Joint::Elbow => [
                (LeftShoulder, LeftElbow, Some(LeftWrist)),
                (RightShoulder, RightElbow, Some(RightWrist)),
            ],
            Joint::Ankle => [(LeftKnee, LeftAnkle, None), (RightKnee, RightAnkle, None)],
            Joint::Neck => [
                (LeftEar, LeftShoulder, Some(LeftHip)),
                (RightEar, RightShoulder, Some(RightHip)),
            ],
        }
    }
}

impl fmt::Display for Joint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Joint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "knee" => Ok(Joint::Knee),
            "hip" => Ok(Joint::Hip),
            "shoulder" => Ok(Joint::Shoulder),
            "elbow" => Ok(Joint::Elbow),
            "ankle" => Ok(Joint::Ankle),
            "neck" => Ok(Joint::Neck),
            other => Err(format!("unknown joint '{}'", other)),
        }
    }
}

/// Angles of every tracked joint for one frame, in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JointAngleSet {
    angles: [Option<f64>; JOINT_COUNT],
}

impl JointAngleSet {
    /// A set with every angle absent.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, joint: Joint) -> Option<f64> {
        self.angles[joint.index()]
    }

    /// Returns a copy with `joint` set to `angle`.
    pub fn with(mut self, joint: Joint, angle: Option<f64>) -> Self {
        self.angles[joint.index()] = angle;
        self
    }

    /// Iterates over `(joint, angle)` pairs, including absent ones.
    pub fn iter(&self) -> impl Iterator<Item = (Joint, Option<f64>)> + '_ {
        Joint::ALL.iter().map(move |j| (*j, self.get(*j)))
    }

    /// Number of joints with an angle.
    pub fn present_count(&self) -> usize {
        self.angles.iter().filter(|a| a.is_some()).count()
    }
}

/// Computes the angle at `b` formed by `a` and `c`, in degrees.
///
/// Returns `None` when either segment is degenerate or a coordinate is not
/// finite.
pub fn angle_at(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> Option<f64> {
    let ba = (a.0 - b.0, a.1 - b.1);
    let bc = (c.0 - b.0, c.1 - b.1);

    let mag_ba = (ba.0 * ba.0 + ba.1 * ba.1).sqrt();
    let mag_bc = (bc.0 * bc.0 + bc.1 * bc.1).sqrt();

    if !mag_ba.is_finite() || !mag_bc.is_finite() {
        return None;
    }
    if mag_ba < MIN_SEGMENT_LENGTH || mag_bc < MIN_SEGMENT_LENGTH {
        return None;
    }

    let dot = ba.0 * bc.0 + ba.1 * bc.1;
    let cos_angle = (dot / (mag_ba * mag_bc)).clamp(-1.0, 1.0);

    Some(cos_angle.acos().to_degrees())
}

/// Extracts joint angles from a frame's keypoints.
#[derive(Debug, Clone, Copy)]
pub struct AngleExtractor {
    min_confidence: f64,
}

impl AngleExtractor {
    pub fn new(min_confidence: f64) -> Self {
        Self { min_confidence }
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    /// Computes every joint angle present in `keypoints`.
    pub fn extract(&self, keypoints: &KeypointMap) -> JointAngleSet {
        Joint::ALL
            .iter()
            .fold(JointAngleSet::empty(), |set, joint| {
                set.with(*joint, self.joint_angle(keypoints, *joint))
            })
    }

    /// Computes a single joint angle, choosing the more confident side.
    pub fn joint_angle(&self, keypoints: &KeypointMap, joint: Joint) -> Option<f64> {
        let mut sides: Vec<(f64, Option<f64>)> = joint
            .landmarks()
            .iter()
            .filter_map(|(a, b, c)| self.side(keypoints, *a, *b, *c))
            .collect();

        // Most confident side first; fall back if its geometry is degenerate.
        sides.sort_by(|x, y| y.0.total_cmp(&x.0));
        sides.into_iter().find_map(|(_, angle)| angle)
    }

    /// Returns `(weakest confidence, angle)` for one side, or `None` if a
    /// landmark is missing or unconfident.
    fn side(
        &self,
        keypoints: &KeypointMap,
        a: Landmark,
        b: Landmark,
        c: Option<Landmark>,
    ) -> Option<(f64, Option<f64>)> {
        let pa = keypoints.confident(a, self.min_confidence)?;
        let pb = keypoints.confident(b, self.min_confidence)?;

        let (pc, weakest) = match c {
            Some(c) => {
                let pc: &Keypoint = keypoints.confident(c, self.min_confidence)?;
                (
                    pc.position(),
                    pa.confidence.min(pb.confidence).min(pc.confidence),
                )
            }
            // Vertical reference below the joint (image y grows downwards).
            None => ((pb.x, pb.y + 1.0), pa.confidence.min(pb.confidence)),
        };

        Some((weakest, angle_at(pa.position(), pb.position(), pc)))
    }
}

impl Default for AngleExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_KEYPOINT_CONFIDENCE)
    }
}
