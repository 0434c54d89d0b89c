//! Hand joint taxonomy and raw per-frame samples.
//!
//! Every backend reports hands in the same 21-joint layout: the wrist
//! first, then four joints per finger in thumb, index, middle, ring, pinky
//! order.  Indices are shared by backends, reconstruction, and publishing.

use nalgebra::Vector3;

// ── Joint definitions ──────────────────────────────────────

/// The 21 joints of the shared hand taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandJoint {
    Wrist,
    ThumbMetacarpal,
    ThumbProximal,
    ThumbDistal,
    ThumbTip,
    IndexProximal,
    IndexIntermediate,
    IndexDistal,
    IndexTip,
    MiddleProximal,
    MiddleIntermediate,
    MiddleDistal,
    MiddleTip,
    RingProximal,
    RingIntermediate,
    RingDistal,
    RingTip,
    PinkyProximal,
    PinkyIntermediate,
    PinkyDistal,
    PinkyTip,
}

/// Total number of joints per hand.
pub const JOINT_COUNT: usize = 21;

/// Maximum number of hands a single sample batch can carry.
pub const MAX_HANDS: usize = 2;

impl HandJoint {
    /// All joints in index order.
    pub const ALL: [HandJoint; JOINT_COUNT] = [
        Self::Wrist,
        Self::ThumbMetacarpal,
        Self::ThumbProximal,
        Self::ThumbDistal,
        Self::ThumbTip,
        Self::IndexProximal,
        Self::IndexIntermediate,
        Self::IndexDistal,
        Self::IndexTip,
        Self::MiddleProximal,
        Self::MiddleIntermediate,
        Self::MiddleDistal,
        Self::MiddleTip,
        Self::RingProximal,
        Self::RingIntermediate,
        Self::RingDistal,
        Self::RingTip,
        Self::PinkyProximal,
        Self::PinkyIntermediate,
        Self::PinkyDistal,
        Self::PinkyTip,
    ];

    /// Convert joint enum to array index (0-20).
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// String representation for status output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wrist => "wrist",
            Self::ThumbMetacarpal => "thumb-metacarpal",
            Self::ThumbProximal => "thumb-proximal",
            Self::ThumbDistal => "thumb-distal",
            Self::ThumbTip => "thumb-tip",
            Self::IndexProximal => "index-proximal",
            Self::IndexIntermediate => "index-intermediate",
            Self::IndexDistal => "index-distal",
            Self::IndexTip => "index-tip",
            Self::MiddleProximal => "middle-proximal",
            Self::MiddleIntermediate => "middle-intermediate",
            Self::MiddleDistal => "middle-distal",
            Self::MiddleTip => "middle-tip",
            Self::RingProximal => "ring-proximal",
            Self::RingIntermediate => "ring-intermediate",
            Self::RingDistal => "ring-distal",
            Self::RingTip => "ring-tip",
            Self::PinkyProximal => "pinky-proximal",
            Self::PinkyIntermediate => "pinky-intermediate",
            Self::PinkyDistal => "pinky-distal",
            Self::PinkyTip => "pinky-tip",
        }
    }
}

// ── Fingers ────────────────────────────────────────────────

/// One of the five fingers, each owning four consecutive joints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Self::Thumb,
        Self::Index,
        Self::Middle,
        Self::Ring,
        Self::Pinky,
    ];

    /// Index of the finger's first (base) joint.
    pub fn base(&self) -> usize {
        1 + 4 * (*self as usize)
    }

    /// The finger's four joint indices, base to tip.
    pub fn joints(&self) -> [usize; 4] {
        let b = self.base();
        [b, b + 1, b + 2, b + 3]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thumb => "thumb",
            Self::Index => "index",
            Self::Middle => "middle",
            Self::Ring => "ring",
            Self::Pinky => "pinky",
        }
    }
}

// ── Hand enum ──────────────────────────────────────────────

/// Which hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    pub fn from_is_left(is_left: bool) -> Self {
        if is_left {
            Self::Left
        } else {
            Self::Right
        }
    }

    pub fn is_left(&self) -> bool {
        matches!(self, Self::Left)
    }
}

// ── Classification ─────────────────────────────────────────

/// Static hand shape reported by the detection backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Classification {
    #[default]
    Unknown,
    Point,
    Fist,
    Ok,
    Like,
    Five,
    Victory,
}

impl Classification {
    /// Map a native classification code.  Unrecognized codes become `Unknown`.
    pub fn from_raw(code: i32) -> Self {
        match code {
            1 => Self::Point,
            2 => Self::Fist,
            3 => Self::Ok,
            4 => Self::Like,
            5 => Self::Five,
            6 => Self::Victory,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Point => "point",
            Self::Fist => "fist",
            Self::Ok => "ok",
            Self::Like => "like",
            Self::Five => "five",
            Self::Victory => "victory",
        }
    }
}

// ── Raw sample ─────────────────────────────────────────────

/// How much of the skeleton a backend actually measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkeletonKind {
    /// All 21 joints carry real positions.
    #[default]
    Full,
    /// Only `points[0]` is meaningful (2D/3D point-only detectors).
    PointOnly,
}

/// Pinch metrics attached to a sample.
///
/// `level` comes from the backend; `anchor` and `direction` are filled in
/// by reconstruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinchSample {
    pub level: f32,
    pub anchor: Vector3<f32>,
    pub direction: Vector3<f32>,
}

impl Default for PinchSample {
    fn default() -> Self {
        Self {
            level: 0.0,
            anchor: Vector3::zeros(),
            direction: Vector3::z(),
        }
    }
}

/// One hand's raw joint sample for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct JointSample {
    pub hand: Hand,
    /// 21 joint positions in taxonomy order (meters, tracking space).
    pub points: [Vector3<f32>; JOINT_COUNT],
    /// Detection confidence (0.0-1.0).
    pub confidence: f32,
    pub pinch: PinchSample,
    pub classification: Classification,
    pub skeleton: SkeletonKind,
}

impl JointSample {
    /// Create an empty sample for a hand.
    pub fn new(hand: Hand) -> Self {
        Self {
            hand,
            points: [Vector3::zeros(); JOINT_COUNT],
            confidence: 0.0,
            pinch: PinchSample::default(),
            classification: Classification::Unknown,
            skeleton: SkeletonKind::Full,
        }
    }

    /// Whether every value the sample carries is a finite number.
    pub fn is_finite(&self) -> bool {
        let points_ok = match self.skeleton {
            SkeletonKind::Full => self.points.iter().all(|p| p.iter().all(|c| c.is_finite())),
            SkeletonKind::PointOnly => self.points[0].iter().all(|c| c.is_finite()),
        };
        points_ok && self.confidence.is_finite() && self.pinch.level.is_finite()
    }

    /// Clamp confidence and pinch level into [0, 1].
    pub fn clamp_ranges(&mut self) {
        self.confidence = self.confidence.clamp(0.0, 1.0);
        self.pinch.level = self.pinch.level.clamp(0.0, 1.0);
    }
}

// ── Sample batch ───────────────────────────────────────────

/// All hands reported by a backend for one native frame.
///
/// Backends keep one batch alive and refill it every tick; `clear` keeps
/// the allocation.
#[derive(Debug, Clone)]
pub struct SampleBatch {
    pub frame_index: i64,
    pub samples: Vec<JointSample>,
}

impl Default for SampleBatch {
    fn default() -> Self {
        Self {
            frame_index: -1,
            samples: Vec::with_capacity(MAX_HANDS),
        }
    }
}

impl SampleBatch {
    pub fn clear(&mut self) {
        self.frame_index = -1;
        self.samples.clear();
    }
}
