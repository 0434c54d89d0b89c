//! Synthetic hand source for headless runs and demos.
//!
//! Animates two hands in front of the camera at the requested detection
//! rate.  Implements both the generic native detector and the platform
//! skeleton API so either backend can run without hardware.  Camera
//! warm-up failures can be injected for the first N start calls.

use nalgebra::{UnitQuaternion, Vector3};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::native::{NativeDetector, NativePoll, RawHandRecord};
use super::skeleton::{PlatformHandApi, SkeletonFrame, XrHandSkeleton, XrJoint, XR_TO_TAXONOMY};
use crate::config::DetectionOptions;
use crate::joints::{Finger, Hand, JOINT_COUNT};
use crate::reconstruction::rest_pose;
use crate::state::FailureCode;

/// Synthetic source configuration.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Start calls that fail with `CameraStart` before the camera comes up.
    pub camera_failures: u32,
    /// Simulated blocking time of every start call.
    pub start_latency: Duration,
    /// Advertise platform skeleton tracking.
    pub platform_skeleton: bool,
    /// Advertise the generic native detector.
    pub native_detector: bool,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            camera_failures: 0,
            start_latency: Duration::from_millis(50),
            platform_skeleton: true,
            native_detector: true,
        }
    }
}

struct SyntheticState {
    running: bool,
    started_at: Option<Instant>,
    max_fps: u32,
    camera_failures_left: u32,
    camera_position: Vector3<f32>,
    camera_rotation: UnitQuaternion<f32>,
    external_transform: bool,
}

/// Deterministic animated hand source.
pub struct SyntheticDetector {
    config: SyntheticConfig,
    state: Mutex<SyntheticState>,
}

impl SyntheticDetector {
    pub fn new(config: SyntheticConfig) -> Arc<Self> {
        let camera_failures_left = config.camera_failures;
        Arc::new(Self {
            config,
            state: Mutex::new(SyntheticState {
                running: false,
                started_at: None,
                max_fps: 30,
                camera_failures_left,
                camera_position: Vector3::zeros(),
                camera_rotation: UnitQuaternion::identity(),
                external_transform: false,
            }),
        })
    }

    fn start(&self, max_fps: u32) -> FailureCode {
        thread::sleep(self.config.start_latency);
        let mut state = self.state.lock();
        if state.camera_failures_left > 0 {
            state.camera_failures_left -= 1;
            info!(
                "synthetic: camera warming up ({} failure(s) left)",
                state.camera_failures_left
            );
            return FailureCode::CameraStart;
        }
        state.running = true;
        state.started_at = Some(Instant::now());
        state.max_fps = max_fps.max(1);
        info!("synthetic: camera started at {} fps", state.max_fps);
        FailureCode::None
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        state.running = false;
        state.started_at = None;
        debug!("synthetic: camera stopped");
    }

    /// Current frame index and animation time, `None` when not running.
    fn current_frame(&self) -> Option<(i64, f32)> {
        let state = self.state.lock();
        let started = state.started_at.filter(|_| state.running)?;
        let t = started.elapsed().as_secs_f32();
        Some(((t * state.max_fps as f32) as i64, t))
    }

    /// World-space joints for `hand` at animation time `t`.
    fn hand_points(&self, hand: Hand, t: f32) -> [Vector3<f32>; JOINT_COUNT] {
        let (position, rotation, external) = {
            let state = self.state.lock();
            (state.camera_position, state.camera_rotation, state.external_transform)
        };
        let mut points = animated_pose(hand, t);
        let side = if hand.is_left() { -0.15 } else { 0.15 };
        let offset = Vector3::new(side, -0.3 + 0.02 * (t * 1.3).sin(), -0.4);
        for p in points.iter_mut() {
            let local = *p + offset;
            *p = if external {
                rotation * local + position
            } else {
                local
            };
        }
        points
    }
}

/// Rest pose with the index finger curling and the thumb swinging in.
pub fn animated_pose(hand: Hand, t: f32) -> [Vector3<f32>; JOINT_COUNT] {
    let mut points = rest_pose(hand);
    let curl = 0.6 * (1.0 - (t * 2.0).cos());
    bend(&mut points, Finger::Index, curl);
    bend(&mut points, Finger::Thumb, 0.4 * (1.0 - (t * 0.7).cos()));
    points
}

fn bend(points: &mut [Vector3<f32>; JOINT_COUNT], finger: Finger, angle: f32) {
    let joints = finger.joints();
    let pivot = points[joints[0]];
    let rotation = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), angle);
    for &j in &joints[1..] {
        points[j] = pivot + rotation * (points[j] - pivot);
    }
}

/// Pinch level of the animation at time `t`.
fn animated_pinch(t: f32) -> f32 {
    0.5 + 0.5 * (t * 0.7).sin()
}

impl NativeDetector for SyntheticDetector {
    fn is_available(&self) -> bool {
        self.config.native_detector
    }

    fn start_detection(&self, options: &DetectionOptions) -> FailureCode {
        self.start(options.max_fps)
    }

    fn stop_detection(&self) {
        self.stop();
    }

    fn poll_result(&self, buffer: &mut [RawHandRecord]) -> NativePoll {
        let Some((frame_index, t)) = self.current_frame() else {
            return NativePoll {
                sample_count: 0,
                frame_index: 0,
            };
        };

        let mut count = 0;
        for (slot, hand) in buffer.iter_mut().zip([Hand::Right, Hand::Left]) {
            let points = self.hand_points(hand, t);
            let pinch = animated_pinch(t);
            *slot = RawHandRecord {
                is_left: i32::from(hand.is_left()),
                points: points.map(|p| [p.x, p.y, p.z]),
                confidence: 0.95,
                pinch_level: pinch,
                // 3 = ok sign while pinching, 5 = open hand.
                classification: if pinch > 0.7 { 3 } else { 5 },
                point_only: 0,
            };
            count += 1;
        }
        NativePoll {
            sample_count: count,
            frame_index,
        }
    }

    fn set_external_transform_mode(&self, enabled: bool) {
        self.state.lock().external_transform = enabled;
    }

    fn set_camera_transform(&self, position: Vector3<f32>, rotation: UnitQuaternion<f32>) {
        let mut state = self.state.lock();
        state.camera_position = position;
        state.camera_rotation = rotation;
    }
}

impl PlatformHandApi for SyntheticDetector {
    fn supports_hand_tracking(&self) -> bool {
        self.config.platform_skeleton
    }

    fn request_permission(&self) -> bool {
        thread::sleep(self.config.start_latency);
        true
    }

    fn start_tracking(&self, max_fps: u32) -> FailureCode {
        self.start(max_fps)
    }

    fn stop_tracking(&self) {
        self.stop();
    }

    fn poll_skeletons(&self, frame: &mut SkeletonFrame) -> i64 {
        let Some((frame_index, t)) = self.current_frame() else {
            frame.left.reset();
            frame.right.reset();
            return 0;
        };
        for hand in [Hand::Left, Hand::Right] {
            let points = self.hand_points(hand, t);
            let skeleton = match hand {
                Hand::Left => &mut frame.left,
                Hand::Right => &mut frame.right,
            };
            fill_xr_skeleton(skeleton, &points);
        }
        frame_index
    }
}

/// Expand 21 taxonomy joints into a full 26-joint XR skeleton.  Joints
/// with no taxonomy counterpart are interpolated.
fn fill_xr_skeleton(skeleton: &mut XrHandSkeleton, points: &[Vector3<f32>; JOINT_COUNT]) {
    skeleton.tracking_active = true;
    skeleton.confidence = 0.95;
    for (point, joint) in points.iter().zip(XR_TO_TAXONOMY.iter()) {
        set_joint(skeleton, *joint, *point);
    }
    let wrist = points[0];
    let midpoint = |i: usize| (wrist + points[i]) * 0.5;
    set_joint(skeleton, XrJoint::Palm, midpoint(Finger::Middle.base()));
    set_joint(skeleton, XrJoint::IndexMetacarpal, midpoint(Finger::Index.base()));
    set_joint(skeleton, XrJoint::MiddleMetacarpal, midpoint(Finger::Middle.base()));
    set_joint(skeleton, XrJoint::RingMetacarpal, midpoint(Finger::Ring.base()));
    set_joint(skeleton, XrJoint::LittleMetacarpal, midpoint(Finger::Pinky.base()));
}

fn set_joint(skeleton: &mut XrHandSkeleton, joint: XrJoint, p: Vector3<f32>) {
    let pose = &mut skeleton.joints[joint.index()];
    pose.position = [p.x, p.y, p.z];
    pose.valid = true;
}
