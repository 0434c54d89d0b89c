//! Platform skeleton backend.
//!
//! Sources hands from a platform hand-tracking API that reports the
//! 26-joint XR hand skeleton (palm, wrist, four joints per digit plus a
//! metacarpal for each finger).  Samples are remapped onto the 21-joint
//! taxonomy.  Permission requests and camera start are blocking platform
//! calls and run through the bridge.

use nalgebra::Vector3;
use std::sync::Arc;
use tracing::{debug, info};

use super::{Admission, FrameCounter, HandBackend, PollOutcome};
use crate::bridge::{CallGate, NativeCall};
use crate::config::DetectionOptions;
use crate::error::EngineError;
use crate::joints::{Hand, JointSample, SampleBatch, SkeletonKind, JOINT_COUNT};
use crate::publisher::ResultPublisher;
use crate::reconstruction::TrackingOrigin;
use crate::state::FailureCode;

/// Camera warm-up can report failure for the first few starts.
pub const PLATFORM_CAMERA_ATTEMPTS: u32 = 5;

/// Thumb-index tip distance at and below which pinch level is 1.0.
const PINCH_CLOSED_M: f32 = 0.025;
/// Thumb-index tip distance at and above which pinch level is 0.0.
const PINCH_OPEN_M: f32 = 0.085;

// ── XR joint definitions ───────────────────────────────────

/// The 26 joints of the XR hand skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XrJoint {
    Palm,
    Wrist,
    ThumbMetacarpal,
    ThumbProximal,
    ThumbDistal,
    ThumbTip,
    IndexMetacarpal,
    IndexProximal,
    IndexIntermediate,
    IndexDistal,
    IndexTip,
    MiddleMetacarpal,
    MiddleProximal,
    MiddleIntermediate,
    MiddleDistal,
    MiddleTip,
    RingMetacarpal,
    RingProximal,
    RingIntermediate,
    RingDistal,
    RingTip,
    LittleMetacarpal,
    LittleProximal,
    LittleIntermediate,
    LittleDistal,
    LittleTip,
}

/// Joints per XR hand skeleton.
pub const XR_JOINT_COUNT: usize = 26;

impl XrJoint {
    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// XR joint feeding each taxonomy slot.  Palm and the four finger
/// metacarpals have no counterpart and are dropped.
pub const XR_TO_TAXONOMY: [XrJoint; JOINT_COUNT] = [
    XrJoint::Wrist,
    XrJoint::ThumbMetacarpal,
    XrJoint::ThumbProximal,
    XrJoint::ThumbDistal,
    XrJoint::ThumbTip,
    XrJoint::IndexProximal,
    XrJoint::IndexIntermediate,
    XrJoint::IndexDistal,
    XrJoint::IndexTip,
    XrJoint::MiddleProximal,
    XrJoint::MiddleIntermediate,
    XrJoint::MiddleDistal,
    XrJoint::MiddleTip,
    XrJoint::RingProximal,
    XrJoint::RingIntermediate,
    XrJoint::RingDistal,
    XrJoint::RingTip,
    XrJoint::LittleProximal,
    XrJoint::LittleIntermediate,
    XrJoint::LittleDistal,
    XrJoint::LittleTip,
];

// ── Skeleton data ──────────────────────────────────────────

/// Pose data for a single XR joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XrJointPose {
    /// Position in meters (x, y, z).
    pub position: [f32; 3],
    /// Orientation quaternion (x, y, z, w).
    pub orientation: [f32; 4],
    /// Joint radius in meters.
    pub radius: f32,
    /// Whether this joint has valid tracking data.
    pub valid: bool,
}

impl Default for XrJointPose {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            orientation: [0.0, 0.0, 0.0, 1.0],
            radius: 0.01,
            valid: false,
        }
    }
}

/// Complete XR skeleton for one hand.
#[derive(Debug, Clone, PartialEq)]
pub struct XrHandSkeleton {
    pub joints: [XrJointPose; XR_JOINT_COUNT],
    /// Whether the platform is tracking this hand right now.
    pub tracking_active: bool,
    /// Overall tracking confidence (0.0-1.0).
    pub confidence: f32,
}

impl Default for XrHandSkeleton {
    fn default() -> Self {
        Self {
            joints: [XrJointPose::default(); XR_JOINT_COUNT],
            tracking_active: false,
            confidence: 0.0,
        }
    }
}

impl XrHandSkeleton {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn position(&self, joint: XrJoint) -> Vector3<f32> {
        let p = self.joints[joint.index()].position;
        Vector3::new(p[0], p[1], p[2])
    }

    /// Whether every joint the taxonomy needs is valid.
    pub fn is_complete(&self) -> bool {
        XR_TO_TAXONOMY.iter().all(|j| self.joints[j.index()].valid)
    }

    /// Remap into a 21-joint sample.
    pub fn fill_sample(&self, hand: Hand, out: &mut JointSample) {
        out.hand = hand;
        out.skeleton = SkeletonKind::Full;
        for (dst, joint) in out.points.iter_mut().zip(XR_TO_TAXONOMY.iter()) {
            *dst = self.position(*joint);
        }
        out.confidence = self.confidence;
        out.pinch.level = pinch_level(
            (self.position(XrJoint::ThumbTip) - self.position(XrJoint::IndexTip)).norm(),
        );
    }
}

/// Map thumb-index tip distance to a pinch level in [0, 1].
pub fn pinch_level(tip_distance_m: f32) -> f32 {
    let t = (tip_distance_m - PINCH_CLOSED_M) / (PINCH_OPEN_M - PINCH_CLOSED_M);
    (1.0 - t).clamp(0.0, 1.0)
}

/// Buffer the platform fills on every poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkeletonFrame {
    pub left: XrHandSkeleton,
    pub right: XrHandSkeleton,
}

impl SkeletonFrame {
    pub fn hand(&self, hand: Hand) -> &XrHandSkeleton {
        match hand {
            Hand::Left => &self.left,
            Hand::Right => &self.right,
        }
    }
}

// ── Platform API ───────────────────────────────────────────

/// Platform hand-tracking entry points.
///
/// `request_permission` and `start_tracking` may block and are only
/// called from bridge workers.
pub trait PlatformHandApi: Send + Sync {
    /// Pure capability probe.
    fn supports_hand_tracking(&self) -> bool;
    fn request_permission(&self) -> bool;
    /// `CameraStart` while the camera is still warming up.
    fn start_tracking(&self, max_fps: u32) -> FailureCode;
    fn stop_tracking(&self);
    /// Fill `frame` and return the platform frame index.
    fn poll_skeletons(&self, frame: &mut SkeletonFrame) -> i64;
}

// ── Backend ────────────────────────────────────────────────

/// Backend over a [`PlatformHandApi`].
pub struct SkeletonBackend {
    api: Arc<dyn PlatformHandApi>,
    gate: CallGate,
    frame: Option<Box<SkeletonFrame>>,
    batch: SampleBatch,
    frames: FrameCounter,
    camera_attempts: u32,
    tracking: bool,
}

impl SkeletonBackend {
    pub fn new(api: Arc<dyn PlatformHandApi>) -> Self {
        Self {
            api,
            gate: CallGate::new(),
            frame: None,
            batch: SampleBatch::default(),
            frames: FrameCounter::default(),
            camera_attempts: PLATFORM_CAMERA_ATTEMPTS,
            tracking: false,
        }
    }

    pub fn with_camera_attempts(mut self, attempts: u32) -> Self {
        self.camera_attempts = attempts.max(1);
        self
    }

    pub fn last_frame_index(&self) -> i64 {
        self.frames.last()
    }
}

impl HandBackend for SkeletonBackend {
    fn is_supported(&self) -> bool {
        self.api.supports_hand_tracking()
    }

    fn description(&self) -> &'static str {
        "platform skeleton tracking"
    }

    fn camera_attempts(&self) -> u32 {
        self.camera_attempts
    }

    fn setup(&mut self) -> Result<NativeCall<FailureCode>, EngineError> {
        self.frames.reset();
        if self.frame.is_none() {
            self.frame = Some(Box::default());
        }
        let api = Arc::clone(&self.api);
        NativeCall::spawn("skeleton-permission", &self.gate, move || {
            if api.request_permission() {
                Ok(FailureCode::None)
            } else {
                info!("skeleton: hand tracking permission denied");
                Ok(FailureCode::Unsupported)
            }
        })
    }

    fn start_detection(
        &mut self,
        options: &DetectionOptions,
    ) -> Result<NativeCall<FailureCode>, EngineError> {
        let api = Arc::clone(&self.api);
        let max_fps = options.max_fps;
        let call = NativeCall::spawn("skeleton-start", &self.gate, move || {
            Ok(api.start_tracking(max_fps))
        })?;
        self.tracking = true;
        Ok(call)
    }

    fn update_result(
        &mut self,
        publisher: &mut ResultPublisher,
        origin: &TrackingOrigin,
        dt_s: f32,
    ) -> PollOutcome {
        let Some(frame) = self.frame.as_mut() else {
            return PollOutcome::Idle;
        };

        let frame_index = self.api.poll_skeletons(frame);
        match self.frames.admit(frame_index) {
            Admission::Fatal => PollOutcome::Fatal(FailureCode::Internal),
            Admission::Stale => PollOutcome::Stale { frame_index },
            Admission::Accepted { first } => {
                self.batch.clear();
                self.batch.frame_index = frame_index;
                for hand in [Hand::Left, Hand::Right] {
                    let skeleton = frame.hand(hand);
                    if !skeleton.tracking_active {
                        continue;
                    }
                    if !skeleton.is_complete() {
                        debug!("skeleton: {} hand missing joints, dropped", hand.as_str());
                        continue;
                    }
                    let mut sample = JointSample::new(hand);
                    skeleton.fill_sample(hand, &mut sample);
                    self.batch.samples.push(sample);
                }
                publisher.publish(&mut self.batch, origin, dt_s);
                PollOutcome::Published { frame_index, first }
            }
        }
    }

    fn stop_detection(&mut self) {
        if self.tracking {
            self.api.stop_tracking();
            self.tracking = false;
            info!("skeleton: tracking stopped");
        }
        if self.frame.take().is_some() {
            debug!("skeleton: released frame buffer");
        }
        self.batch.clear();
    }
}
