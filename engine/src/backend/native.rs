//! Generic native detector backend.
//!
//! Wraps a camera-based native hand detector that runs its own detection
//! loop and exposes results through a caller-owned record buffer.  The
//! buffer is allocated on setup, reused every frame, and released on stop.

use nalgebra::{UnitQuaternion, Vector3};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{Admission, FrameCounter, HandBackend, PollOutcome};
use crate::bridge::{CallGate, NativeCall};
use crate::config::DetectionOptions;
use crate::error::EngineError;
use crate::joints::{
    Classification, Hand, JointSample, SampleBatch, SkeletonKind, JOINT_COUNT, MAX_HANDS,
};
use crate::publisher::ResultPublisher;
use crate::reconstruction::TrackingOrigin;
use crate::state::FailureCode;

/// The native detector does not retry camera start on its own behalf.
pub const GENERIC_CAMERA_ATTEMPTS: u32 = 1;

// ── Native record layout ───────────────────────────────────

/// One hand as written by the native detector.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawHandRecord {
    /// Non-zero for the left hand.
    pub is_left: i32,
    pub points: [[f32; 3]; JOINT_COUNT],
    pub confidence: f32,
    pub pinch_level: f32,
    /// Native gesture code, see [`Classification::from_raw`].
    pub classification: i32,
    /// Non-zero when only `points[0]` is measured.
    pub point_only: i32,
}

impl Default for RawHandRecord {
    fn default() -> Self {
        Self {
            is_left: 0,
            points: [[0.0; 3]; JOINT_COUNT],
            confidence: 0.0,
            pinch_level: 0.0,
            classification: 0,
            point_only: 0,
        }
    }
}

impl RawHandRecord {
    /// Copy this record into a sample without allocating.
    pub fn fill_sample(&self, out: &mut JointSample) {
        out.hand = Hand::from_is_left(self.is_left != 0);
        for (dst, src) in out.points.iter_mut().zip(self.points.iter()) {
            *dst = Vector3::new(src[0], src[1], src[2]);
        }
        out.confidence = self.confidence;
        out.pinch.level = self.pinch_level;
        out.classification = Classification::from_raw(self.classification);
        out.skeleton = if self.point_only != 0 {
            SkeletonKind::PointOnly
        } else {
            SkeletonKind::Full
        };
    }
}

/// Result of one native poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativePoll {
    /// Records written into the buffer.
    pub sample_count: usize,
    /// Native frame counter; negative once the detection loop has died.
    pub frame_index: i64,
}

// ── Native detector ────────────────────────────────────────

/// Native detector entry points.
///
/// `start_detection` may block for a long time and is only ever called
/// from a bridge worker.  Everything else is non-blocking.
pub trait NativeDetector: Send + Sync {
    fn is_available(&self) -> bool;
    fn start_detection(&self, options: &DetectionOptions) -> FailureCode;
    fn stop_detection(&self);
    fn poll_result(&self, buffer: &mut [RawHandRecord]) -> NativePoll;
    /// When enabled the detector reports points relative to the camera
    /// transform supplied each frame.
    fn set_external_transform_mode(&self, enabled: bool);
    fn set_camera_transform(&self, position: Vector3<f32>, rotation: UnitQuaternion<f32>);
}

// ── Backend ────────────────────────────────────────────────

/// Backend over a [`NativeDetector`].
pub struct NativeBackend {
    detector: Arc<dyn NativeDetector>,
    gate: CallGate,
    buffer: Option<Box<[RawHandRecord]>>,
    batch: SampleBatch,
    frames: FrameCounter,
    detecting: bool,
}

impl NativeBackend {
    pub fn new(detector: Arc<dyn NativeDetector>) -> Self {
        Self {
            detector,
            gate: CallGate::new(),
            buffer: None,
            batch: SampleBatch::default(),
            frames: FrameCounter::default(),
            detecting: false,
        }
    }

    /// Whether the native record buffer is currently allocated.
    pub fn has_buffer(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn last_frame_index(&self) -> i64 {
        self.frames.last()
    }
}

impl HandBackend for NativeBackend {
    fn is_supported(&self) -> bool {
        self.detector.is_available()
    }

    fn description(&self) -> &'static str {
        "generic native detector"
    }

    fn camera_attempts(&self) -> u32 {
        GENERIC_CAMERA_ATTEMPTS
    }

    fn setup(&mut self) -> Result<NativeCall<FailureCode>, EngineError> {
        self.frames.reset();
        if !self.detector.is_available() {
            return Ok(NativeCall::resolved("native-setup", FailureCode::Unsupported));
        }
        if self.buffer.is_none() {
            self.buffer = Some(vec![RawHandRecord::default(); MAX_HANDS].into_boxed_slice());
            debug!("native: allocated record buffer for {} hands", MAX_HANDS);
        }
        self.detector.set_external_transform_mode(true);
        Ok(NativeCall::resolved("native-setup", FailureCode::None))
    }

    fn start_detection(
        &mut self,
        options: &DetectionOptions,
    ) -> Result<NativeCall<FailureCode>, EngineError> {
        let detector = Arc::clone(&self.detector);
        let options = *options;
        let call = NativeCall::spawn("native-start", &self.gate, move || {
            Ok(detector.start_detection(&options))
        })?;
        self.detecting = true;
        info!("native: starting detection at {} fps", options.max_fps);
        Ok(call)
    }

    fn update_result(
        &mut self,
        publisher: &mut ResultPublisher,
        origin: &TrackingOrigin,
        dt_s: f32,
    ) -> PollOutcome {
        let Some(buffer) = self.buffer.as_mut() else {
            return PollOutcome::Idle;
        };

        self.detector
            .set_camera_transform(origin.position, origin.rotation);
        let poll = self.detector.poll_result(buffer);

        match self.frames.admit(poll.frame_index) {
            Admission::Fatal => {
                warn!("native: detector reported frame {}, detection loop lost", poll.frame_index);
                PollOutcome::Fatal(FailureCode::Internal)
            }
            Admission::Stale => PollOutcome::Stale {
                frame_index: poll.frame_index,
            },
            Admission::Accepted { first } => {
                self.batch.clear();
                self.batch.frame_index = poll.frame_index;
                let count = poll.sample_count.min(buffer.len());
                for record in buffer[..count].iter() {
                    let mut sample = JointSample::new(Hand::Right);
                    record.fill_sample(&mut sample);
                    self.batch.samples.push(sample);
                }
                publisher.publish(&mut self.batch, origin, dt_s);
                PollOutcome::Published {
                    frame_index: poll.frame_index,
                    first,
                }
            }
        }
    }

    fn stop_detection(&mut self) {
        if self.detecting {
            self.detector.stop_detection();
            self.detecting = false;
            info!("native: detection stopped");
        }
        if self.buffer.take().is_some() {
            debug!("native: released record buffer");
        }
        self.batch.clear();
    }
}
