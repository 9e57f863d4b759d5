//! Pose detection input schema.
//!
//! The pose-estimation model is an external collaborator. It hands the engine
//! one [`FrameResult`] per processed frame, carrying either a set of keypoints
//! with confidences or the error the inference call raised.
//!
//! Landmarks are a closed enum (the 17 COCO body landmarks) so that every
//! lookup is checked at compile time instead of by string key.
//!
//! # Wire Format
//!
//! ```json
//! {
//!   "timestamp_ms": 1033,
//!   "latency_ms": 41.5,
//!   "detection": {
//!     "kind": "pose",
//!     "overall_score": 0.82,
//!     "keypoints": [
//!       { "name": "left_hip", "x": 0.41, "y": 0.52, "confidence": 0.9 }
//!     ]
//!   }
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of landmarks in the body model.
pub const LANDMARK_COUNT: usize = 17;

/// A named body landmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Landmark {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl Landmark {
    /// Every landmark, in index order.
    pub const ALL: [Landmark; LANDMARK_COUNT] = [
        Landmark::Nose,
        Landmark::LeftEye,
        Landmark::RightEye,
        Landmark::LeftEar,
        Landmark::RightEar,
        Landmark::LeftShoulder,
        Landmark::RightShoulder,
        Landmark::LeftElbow,
        Landmark::RightElbow,
        Landmark::LeftWrist,
        Landmark::RightWrist,
        Landmark::LeftHip,
        Landmark::RightHip,
        Landmark::LeftKnee,
        Landmark::RightKnee,
        Landmark::LeftAnkle,
        Landmark::RightAnkle,
    ];

    /// Dense index of this landmark (0..17).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Wire name of this landmark.
    pub fn as_str(&self) -> &'static str {
        match self {
            Landmark::Nose => "nose",
            Landmark::LeftEye => "left_eye",
            Landmark::RightEye => "right_eye",
            Landmark::LeftEar => "left_ear",
            Landmark::RightEar => "right_ear",
            Landmark::LeftShoulder => "left_shoulder",
            Landmark::RightShoulder => "right_shoulder",
            Landmark::LeftElbow => "left_elbow",
            Landmark::RightElbow => "right_elbow",
            Landmark::LeftWrist => "left_wrist",
            Landmark::RightWrist => "right_wrist",
            Landmark::LeftHip => "left_hip",
            Landmark::RightHip => "right_hip",
            Landmark::LeftKnee => "left_knee",
            Landmark::RightKnee => "right_knee",
            Landmark::LeftAnkle => "left_ankle",
            Landmark::RightAnkle => "right_ankle",
        }
    }
}

impl fmt::Display for Landmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single detected landmark in normalized image coordinates.
///
/// `y` grows downwards, as in image space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub name: Landmark,
    pub x: f64,
    pub y: f64,
    /// Detector confidence in [0, 1].
    pub confidence: f64,
}

impl Keypoint {
    pub fn new(name: Landmark, x: f64, y: f64, confidence: f64) -> Self {
        Self {
            name,
            x,
            y,
            confidence,
        }
    }

    /// Position as an `(x, y)` pair.
    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

/// Keypoints of one frame indexed by landmark.
///
/// Built from the detector's list; when a landmark appears more than once the
/// most confident entry wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeypointMap {
    points: [Option<Keypoint>; LANDMARK_COUNT],
}

impl KeypointMap {
    pub fn from_keypoints(keypoints: &[Keypoint]) -> Self {
        let mut points: [Option<Keypoint>; LANDMARK_COUNT] = [None; LANDMARK_COUNT];
        for kp in keypoints {
            let idx = kp.name.index();
            let replace = match &points[idx] {
                Some(existing) => kp.confidence > existing.confidence,
                None => true,
            };
            if replace {
                points[idx] = Some(*kp);
            }
        }
        Self { points }
    }

    pub fn get(&self, landmark: Landmark) -> Option<&Keypoint> {
        self.points[landmark.index()].as_ref()
    }

    /// Returns the keypoint only if its confidence reaches `min_confidence`.
    pub fn confident(&self, landmark: Landmark, min_confidence: f64) -> Option<&Keypoint> {
        self.get(landmark)
            .filter(|kp| kp.confidence.is_finite() && kp.confidence >= min_confidence)
    }

    /// Number of landmarks present.
    pub fn len(&self) -> usize {
        self.points.iter().filter(|p| p.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A successful pose inference for one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseDetection {
    /// Detected landmarks. Empty means no body was visible.
    #[serde(default)]
    pub keypoints: Vec<Keypoint>,
    /// Overall pose score reported by the model, in [0, 1].
    #[serde(default)]
    pub overall_score: f64,
}

impl PoseDetection {
    pub fn new(keypoints: Vec<Keypoint>, overall_score: f64) -> Self {
        Self {
            keypoints,
            overall_score,
        }
    }

    /// A detection with no visible body.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn keypoint_map(&self) -> KeypointMap {
        KeypointMap::from_keypoints(&self.keypoints)
    }
}

/// Outcome of the external inference call for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Detection {
    /// The model produced a (possibly empty) pose.
    Pose(PoseDetection),
    /// The inference call raised an error.
    Failed { reason: String },
}

/// One detection result delivered by the host per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameResult {
    /// Host monotonic clock, in milliseconds.
    pub timestamp_ms: u64,

    /// Inference latency measured by the host, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,

    /// Session generation the inference request was issued under.
    ///
    /// Results tagged with an older generation than the engine's current one
    /// are discarded. Untagged results are always accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<u64>,

    pub detection: Detection,
}

impl FrameResult {
    /// A frame carrying a pose detection.
    pub fn pose(timestamp_ms: u64, detection: PoseDetection) -> Self {
        Self {
            timestamp_ms,
            latency_ms: None,
            generation: None,
            detection: Detection::Pose(detection),
        }
    }

    /// A frame whose inference call failed.
    pub fn failed(timestamp_ms: u64, reason: impl Into<String>) -> Self {
        Self {
            timestamp_ms,
            latency_ms: None,
            generation: None,
            detection: Detection::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn with_latency_ms(mut self, latency_ms: f64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }
}
