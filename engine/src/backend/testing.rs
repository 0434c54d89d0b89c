//! Scripted native doubles shared by backend and lifecycle tests.

use nalgebra::{UnitQuaternion, Vector3};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::native::{NativeDetector, NativePoll, RawHandRecord};
use super::skeleton::{PlatformHandApi, SkeletonFrame, XrHandSkeleton, XrJointPose, XR_TO_TAXONOMY};
use crate::bridge::NativeCall;
use crate::config::DetectionOptions;
use crate::joints::{Hand, JOINT_COUNT};
use crate::reconstruction::rest_pose;
use crate::state::FailureCode;

/// Spin until a bridge call completes.
pub fn wait_for<T>(call: &NativeCall<T>) {
    let start = Instant::now();
    while !call.is_complete() {
        assert!(start.elapsed() < Duration::from_secs(5), "call {} never completed", call.label());
        thread::sleep(Duration::from_millis(1));
    }
}

/// Build a fully valid XR skeleton whose taxonomy joints sit at `points`.
pub fn skeleton_from_points(points: &[Vector3<f32>; JOINT_COUNT], confidence: f32) -> XrHandSkeleton {
    let mut skeleton = XrHandSkeleton {
        tracking_active: true,
        confidence,
        ..XrHandSkeleton::default()
    };
    for joint in skeleton.joints.iter_mut() {
        joint.valid = true;
    }
    for (point, joint) in points.iter().zip(XR_TO_TAXONOMY.iter()) {
        skeleton.joints[joint.index()] = XrJointPose {
            position: [point.x, point.y, point.z],
            valid: true,
            ..XrJointPose::default()
        };
    }
    skeleton
}

/// Native record carrying the rest pose of `hand`, shifted by `dx` on X.
pub fn raw_record(hand: Hand, dx: f32) -> RawHandRecord {
    let mut record = RawHandRecord {
        is_left: i32::from(hand.is_left()),
        confidence: 0.8,
        pinch_level: 0.1,
        classification: 5,
        ..RawHandRecord::default()
    };
    for (dst, p) in record.points.iter_mut().zip(rest_pose(hand).iter()) {
        *dst = [p.x + dx, p.y, p.z];
    }
    record
}

// ── Scripted detector ──────────────────────────────────────

#[derive(Default)]
struct DetectorScript {
    available: bool,
    start_results: VecDeque<FailureCode>,
    start_blocker: Option<mpsc::Receiver<()>>,
    panic_on_start: bool,
    start_calls: u32,
    stop_calls: u32,
    external_transform: bool,
    camera_position: Vector3<f32>,
    frame_index: i64,
    records: Vec<RawHandRecord>,
    sample_count: Option<usize>,
}

/// [`NativeDetector`] that replays scripted frames and start results.
pub struct ScriptedDetector {
    script: Mutex<DetectorScript>,
}

impl ScriptedDetector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(DetectorScript {
                available: true,
                frame_index: -1,
                ..DetectorScript::default()
            }),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        let detector = Self::new();
        detector.script.lock().available = false;
        detector
    }

    /// Results for successive start calls; `None` once exhausted.
    pub fn script_starts(&self, results: &[FailureCode]) {
        self.script.lock().start_results = results.iter().copied().collect();
    }

    /// Make the next start call block until the returned sender fires.
    pub fn block_next_start(&self) -> mpsc::Sender<()> {
        let (tx, rx) = mpsc::channel();
        self.script.lock().start_blocker = Some(rx);
        tx
    }

    /// Make the next start call panic inside the native layer.
    pub fn panic_next_start(&self) {
        self.script.lock().panic_on_start = true;
    }

    pub fn push_frame(&self, frame_index: i64, records: Vec<RawHandRecord>) {
        let mut script = self.script.lock();
        script.frame_index = frame_index;
        script.records = records;
        script.sample_count = None;
    }

    /// Like `push_frame` but reports a sample count that may disagree with
    /// the records supplied.
    pub fn push_frame_with_count(&self, frame_index: i64, records: Vec<RawHandRecord>, count: usize) {
        self.push_frame(frame_index, records);
        self.script.lock().sample_count = Some(count);
    }

    pub fn start_calls(&self) -> u32 {
        self.script.lock().start_calls
    }

    pub fn stop_calls(&self) -> u32 {
        self.script.lock().stop_calls
    }

    pub fn external_transform(&self) -> bool {
        self.script.lock().external_transform
    }

    pub fn camera_position(&self) -> Vector3<f32> {
        self.script.lock().camera_position
    }
}

impl NativeDetector for ScriptedDetector {
    fn is_available(&self) -> bool {
        self.script.lock().available
    }

    fn start_detection(&self, _options: &DetectionOptions) -> FailureCode {
        let (blocker, panics) = {
            let mut script = self.script.lock();
            script.start_calls += 1;
            let panics = std::mem::take(&mut script.panic_on_start);
            (script.start_blocker.take(), panics)
        };
        if let Some(rx) = blocker {
            rx.recv().ok();
        }
        if panics {
            panic!("scripted native start failure");
        }
        self.script
            .lock()
            .start_results
            .pop_front()
            .unwrap_or(FailureCode::None)
    }

    fn stop_detection(&self) {
        self.script.lock().stop_calls += 1;
    }

    fn poll_result(&self, buffer: &mut [RawHandRecord]) -> NativePoll {
        let script = self.script.lock();
        let written = script.records.len().min(buffer.len());
        buffer[..written].copy_from_slice(&script.records[..written]);
        NativePoll {
            sample_count: script.sample_count.unwrap_or(written),
            frame_index: script.frame_index,
        }
    }

    fn set_external_transform_mode(&self, enabled: bool) {
        self.script.lock().external_transform = enabled;
    }

    fn set_camera_transform(&self, position: Vector3<f32>, _rotation: UnitQuaternion<f32>) {
        self.script.lock().camera_position = position;
    }
}

// ── Scripted platform ──────────────────────────────────────

#[derive(Default)]
struct PlatformScript {
    supported: bool,
    permission: bool,
    permission_requests: u32,
    start_results: VecDeque<FailureCode>,
    start_calls: u32,
    stop_calls: u32,
    frame_index: i64,
    frame: SkeletonFrame,
}

/// [`PlatformHandApi`] that replays scripted skeleton frames.
pub struct ScriptedPlatform {
    script: Mutex<PlatformScript>,
}

impl ScriptedPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(PlatformScript {
                supported: true,
                permission: true,
                frame_index: -1,
                ..PlatformScript::default()
            }),
        })
    }

    pub fn unsupported() -> Arc<Self> {
        let platform = Self::new();
        platform.script.lock().supported = false;
        platform
    }

    pub fn deny_permission(&self) {
        self.script.lock().permission = false;
    }

    pub fn script_starts(&self, results: &[FailureCode]) {
        self.script.lock().start_results = results.iter().copied().collect();
    }

    pub fn push_frame(&self, frame_index: i64, left: Option<XrHandSkeleton>, right: Option<XrHandSkeleton>) {
        let mut script = self.script.lock();
        script.frame_index = frame_index;
        script.frame.left = left.unwrap_or_default();
        script.frame.right = right.unwrap_or_default();
    }

    pub fn permission_requests(&self) -> u32 {
        self.script.lock().permission_requests
    }

    pub fn start_calls(&self) -> u32 {
        self.script.lock().start_calls
    }

    pub fn stop_calls(&self) -> u32 {
        self.script.lock().stop_calls
    }
}

impl PlatformHandApi for ScriptedPlatform {
    fn supports_hand_tracking(&self) -> bool {
        self.script.lock().supported
    }

    fn request_permission(&self) -> bool {
        let mut script = self.script.lock();
        script.permission_requests += 1;
        script.permission
    }

    fn start_tracking(&self, _max_fps: u32) -> FailureCode {
        let mut script = self.script.lock();
        script.start_calls += 1;
        script.start_results.pop_front().unwrap_or(FailureCode::None)
    }

    fn stop_tracking(&self) {
        self.script.lock().stop_calls += 1;
    }

    fn poll_skeletons(&self, frame: &mut SkeletonFrame) -> i64 {
        let script = self.script.lock();
        frame.clone_from(&script.frame);
        script.frame_index
    }
}
