//! Per-hand gesture results published to consumers.
//!
//! The publisher owns one result slot per hand.  Slots are updated in
//! place every accepted frame; a hand missing from a batch, or reported
//! with an unusable sample, reads as `None` until it is seen again.

use nalgebra::{UnitQuaternion, Vector3};
use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::joints::{Classification, Hand, JointSample, SampleBatch, SkeletonKind, JOINT_COUNT};
use crate::reconstruction::{
    identity_rotations, look_rotation, reconstruct, reconstruct_point_only, RotationSet,
    TrackingOrigin,
};

// ── Result types ───────────────────────────────────────────

/// Smoothed pinch state of a hand.
#[derive(Debug, Clone, PartialEq)]
pub struct PinchState {
    pub level: f32,
    /// `level` strictly above the configured threshold.
    pub is_pinching: bool,
    pub anchor: Vector3<f32>,
    /// Unit pinch ray direction, low-pass filtered across frames.
    pub direction: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
}

impl Default for PinchState {
    fn default() -> Self {
        Self {
            level: 0.0,
            is_pinching: false,
            anchor: Vector3::zeros(),
            direction: Vector3::z(),
            rotation: UnitQuaternion::identity(),
        }
    }
}

/// Published state of one tracked hand.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureResult {
    pub hand: Hand,
    pub points: [Vector3<f32>; JOINT_COUNT],
    pub rotations: RotationSet,
    /// Hand position (palm center, or the single point for point-only).
    pub position: Vector3<f32>,
    /// Hand rotation (palm rotation).
    pub rotation: UnitQuaternion<f32>,
    pub gesture: Classification,
    pub confidence: f32,
    pub pinch: PinchState,
    pub skeleton: SkeletonKind,
}

impl GestureResult {
    pub fn new(hand: Hand) -> Self {
        Self {
            hand,
            points: [Vector3::zeros(); JOINT_COUNT],
            rotations: identity_rotations(),
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            gesture: Classification::Unknown,
            confidence: 0.0,
            pinch: PinchState::default(),
            skeleton: SkeletonKind::Full,
        }
    }

    pub fn is_left(&self) -> bool {
        self.hand.is_left()
    }

    /// One-line s-expression summary for logs.
    pub fn summary_sexp(&self) -> String {
        format!(
            "(:hand :{} :gesture :{} :confidence {:.2} :position ({:.3} {:.3} {:.3}) :pinch (:level {:.2} :pinching {}))",
            self.hand.as_str(),
            self.gesture.as_str(),
            self.confidence,
            self.position.x,
            self.position.y,
            self.position.z,
            self.pinch.level,
            if self.pinch.is_pinching { "t" } else { "nil" },
        )
    }
}

/// Blend a previous pinch direction toward a new one by `t` (clamped to
/// [0, 1]) and renormalize.
pub fn smooth_direction(previous: &Vector3<f32>, target: &Vector3<f32>, t: f32) -> Vector3<f32> {
    let blended = previous.lerp(target, t.clamp(0.0, 1.0));
    let norm = blended.norm();
    if norm > 1e-6 {
        blended / norm
    } else {
        *target
    }
}

// ── Publisher ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
struct PublishSettings {
    pinch_threshold: f32,
    pinch_smoothing_rate: f32,
    min_confidence: f32,
}

/// Holds the latest left/right results.
#[derive(Debug, Clone)]
pub struct ResultPublisher {
    settings: PublishSettings,
    left: Option<GestureResult>,
    right: Option<GestureResult>,
    frames_published: u64,
}

impl ResultPublisher {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            settings: PublishSettings {
                pinch_threshold: config.pinch_threshold,
                pinch_smoothing_rate: config.pinch_smoothing_rate,
                min_confidence: config.min_confidence,
            },
            left: None,
            right: None,
            frames_published: 0,
        }
    }

    pub fn left(&self) -> Option<&GestureResult> {
        self.left.as_ref()
    }

    pub fn right(&self) -> Option<&GestureResult> {
        self.right.as_ref()
    }

    pub fn get(&self, hand: Hand) -> Option<&GestureResult> {
        match hand {
            Hand::Left => self.left.as_ref(),
            Hand::Right => self.right.as_ref(),
        }
    }

    /// Accepted batches published since creation.
    pub fn frames_published(&self) -> u64 {
        self.frames_published
    }

    /// Drop both results.
    pub fn clear(&mut self) {
        self.left = None;
        self.right = None;
    }

    fn slot_mut(&mut self, hand: Hand) -> &mut Option<GestureResult> {
        match hand {
            Hand::Left => &mut self.left,
            Hand::Right => &mut self.right,
        }
    }

    /// Publish an accepted batch.
    ///
    /// Reconstruction writes the raw pinch ray back into each sample; the
    /// published direction is the smoothed one.
    pub fn publish(&mut self, batch: &mut SampleBatch, origin: &TrackingOrigin, dt_s: f32) {
        let settings = self.settings;
        let mut seen_left = false;
        let mut seen_right = false;

        for sample in batch.samples.iter_mut() {
            let seen = match sample.hand {
                Hand::Left => &mut seen_left,
                Hand::Right => &mut seen_right,
            };
            if *seen {
                debug!(
                    "publish: duplicate {} hand in frame {}, ignoring",
                    sample.hand.as_str(),
                    batch.frame_index
                );
                continue;
            }
            *seen = true;

            let slot = self.slot_mut(sample.hand);
            if !sample.is_finite() || sample.confidence < settings.min_confidence {
                trace!("publish: unusable {} hand sample", sample.hand.as_str());
                *slot = None;
                continue;
            }
            sample.clamp_ranges();

            match slot {
                Some(result) => apply_sample(result, sample, origin, dt_s, &settings, false),
                None => {
                    let mut result = GestureResult::new(sample.hand);
                    apply_sample(&mut result, sample, origin, dt_s, &settings, true);
                    *slot = Some(result);
                }
            }
        }

        // A hand absent from the batch is no longer tracked.
        if !seen_left {
            self.left = None;
        }
        if !seen_right {
            self.right = None;
        }
        self.frames_published += 1;
    }
}

fn apply_sample(
    result: &mut GestureResult,
    sample: &mut JointSample,
    origin: &TrackingOrigin,
    dt_s: f32,
    settings: &PublishSettings,
    fresh: bool,
) {
    result.points = sample.points;
    result.skeleton = sample.skeleton;
    let frame = match sample.skeleton {
        SkeletonKind::Full => reconstruct(&sample.points, sample.hand, origin, &mut result.rotations),
        SkeletonKind::PointOnly => {
            reconstruct_point_only(&sample.points[0], origin, &mut result.rotations)
        }
    };
    sample.pinch.anchor = frame.pinch_anchor;
    sample.pinch.direction = frame.pinch_direction;

    result.position = frame.position;
    result.rotation = frame.rotation;
    result.gesture = sample.classification;
    result.confidence = sample.confidence;

    let pinch = &mut result.pinch;
    pinch.level = sample.pinch.level;
    pinch.is_pinching = sample.pinch.level > settings.pinch_threshold;
    pinch.anchor = frame.pinch_anchor;
    pinch.direction = if fresh {
        frame.pinch_direction
    } else {
        smooth_direction(
            &pinch.direction,
            &frame.pinch_direction,
            settings.pinch_smoothing_rate * dt_s,
        )
    };
    pinch.rotation = look_rotation(&pinch.direction, &(frame.rotation * Vector3::y()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconstruction::rest_pose;
    use approx::assert_abs_diff_eq;

    fn full_sample(hand: Hand, pinch_level: f32) -> JointSample {
        let mut sample = JointSample::new(hand);
        sample.points = rest_pose(hand);
        sample.confidence = 0.9;
        sample.pinch.level = pinch_level;
        sample.classification = Classification::Five;
        sample
    }

    fn point_sample(hand: Hand, point: Vector3<f32>) -> JointSample {
        let mut sample = JointSample::new(hand);
        sample.points[0] = point;
        sample.skeleton = SkeletonKind::PointOnly;
        sample.confidence = 1.0;
        sample
    }

    fn batch(frame_index: i64, samples: Vec<JointSample>) -> SampleBatch {
        SampleBatch {
            frame_index,
            samples,
        }
    }

    #[test]
    fn test_two_hands_published() {
        let mut publisher = ResultPublisher::new(&EngineConfig::default());
        let mut b = batch(0, vec![full_sample(Hand::Left, 0.1), full_sample(Hand::Right, 0.1)]);
        publisher.publish(&mut b, &TrackingOrigin::default(), 0.033);

        let left = publisher.left().unwrap();
        let right = publisher.right().unwrap();
        assert!(left.is_left());
        assert!(!right.is_left());
        assert_eq!(left.gesture, Classification::Five);
        assert_eq!(publisher.frames_published(), 1);
    }

    #[test]
    fn test_single_hand_clears_other_slot() {
        let mut publisher = ResultPublisher::new(&EngineConfig::default());
        let origin = TrackingOrigin::default();
        let mut both = batch(0, vec![full_sample(Hand::Left, 0.0), full_sample(Hand::Right, 0.0)]);
        publisher.publish(&mut both, &origin, 0.033);
        assert!(publisher.left().is_some() && publisher.right().is_some());

        let mut only_left = batch(1, vec![full_sample(Hand::Left, 0.0)]);
        publisher.publish(&mut only_left, &origin, 0.033);
        assert!(publisher.left().is_some());
        assert!(publisher.right().is_none());

        let mut only_right = batch(2, vec![full_sample(Hand::Right, 0.0)]);
        publisher.publish(&mut only_right, &origin, 0.033);
        assert!(publisher.left().is_none());
        assert!(publisher.right().is_some());

        let mut none = batch(3, Vec::new());
        publisher.publish(&mut none, &origin, 0.033);
        assert!(publisher.left().is_none());
        assert!(publisher.right().is_none());
    }

    #[test]
    fn test_pinch_threshold_is_strict() {
        let mut publisher = ResultPublisher::new(&EngineConfig::default());
        let origin = TrackingOrigin::default();

        let mut at = batch(0, vec![full_sample(Hand::Right, 0.70)]);
        publisher.publish(&mut at, &origin, 0.033);
        assert!(!publisher.right().unwrap().pinch.is_pinching);

        let mut above = batch(1, vec![full_sample(Hand::Right, 0.70001)]);
        publisher.publish(&mut above, &origin, 0.033);
        assert!(publisher.right().unwrap().pinch.is_pinching);
    }

    #[test]
    fn test_unusable_samples_publish_none() {
        let config = EngineConfig {
            min_confidence: 0.5,
            ..EngineConfig::default()
        };
        let mut publisher = ResultPublisher::new(&config);
        let origin = TrackingOrigin::default();

        let mut nan = full_sample(Hand::Left, 0.0);
        nan.points[7].x = f32::NAN;
        let mut weak = full_sample(Hand::Right, 0.0);
        weak.confidence = 0.2;
        let mut b = batch(0, vec![nan, weak]);
        publisher.publish(&mut b, &origin, 0.033);
        assert!(publisher.left().is_none());
        assert!(publisher.right().is_none());
    }

    #[test]
    fn test_duplicate_hand_keeps_first_sample() {
        let mut publisher = ResultPublisher::new(&EngineConfig::default());
        let first = full_sample(Hand::Left, 0.2);
        let second = full_sample(Hand::Left, 0.9);
        let mut b = batch(0, vec![first, second]);
        publisher.publish(&mut b, &TrackingOrigin::default(), 0.033);
        let left = publisher.left().unwrap();
        assert!((left.pinch.level - 0.2).abs() < 1e-6);
        assert!(publisher.right().is_none());
    }

    #[test]
    fn test_levels_clamped() {
        let mut publisher = ResultPublisher::new(&EngineConfig::default());
        let mut sample = full_sample(Hand::Right, 1.7);
        sample.confidence = 3.0;
        let mut b = batch(0, vec![sample]);
        publisher.publish(&mut b, &TrackingOrigin::default(), 0.033);
        let right = publisher.right().unwrap();
        assert!((right.pinch.level - 1.0).abs() < 1e-6);
        assert!((right.confidence - 1.0).abs() < 1e-6);
        assert!(right.pinch.is_pinching);
    }

    #[test]
    fn test_pinch_direction_smoothing() {
        let mut publisher = ResultPublisher::new(&EngineConfig::default());
        let origin = TrackingOrigin::default();

        // Freshly appearing hand takes the raw direction.
        let mut first = batch(0, vec![point_sample(Hand::Right, Vector3::new(0.0, 0.0, 1.0))]);
        publisher.publish(&mut first, &origin, 0.1);
        let dir = publisher.right().unwrap().pinch.direction;
        assert_abs_diff_eq!(dir, Vector3::z(), epsilon = 1e-5);

        // rate 5.0 * dt 0.1 = halfway blend, then renormalized.
        let mut second = batch(1, vec![point_sample(Hand::Right, Vector3::new(1.0, 0.0, 0.0))]);
        publisher.publish(&mut second, &origin, 0.1);
        let dir = publisher.right().unwrap().pinch.direction;
        let expected = Vector3::new(1.0, 0.0, 1.0).normalize();
        assert_abs_diff_eq!(dir, expected, epsilon = 1e-5);
        assert_abs_diff_eq!(second.samples[0].pinch.direction, Vector3::x(), epsilon = 1e-5);
    }

    #[test]
    fn test_large_dt_snaps_direction() {
        let mut publisher = ResultPublisher::new(&EngineConfig::default());
        let origin = TrackingOrigin::default();
        let mut first = batch(0, vec![point_sample(Hand::Left, Vector3::new(0.0, 0.0, 1.0))]);
        publisher.publish(&mut first, &origin, 0.1);
        let mut second = batch(1, vec![point_sample(Hand::Left, Vector3::new(0.0, 1.0, 0.0))]);
        publisher.publish(&mut second, &origin, 2.0);
        let dir = publisher.left().unwrap().pinch.direction;
        assert_abs_diff_eq!(dir, Vector3::y(), epsilon = 1e-5);
    }

    #[test]
    fn test_reappearing_hand_is_fresh() {
        let mut publisher = ResultPublisher::new(&EngineConfig::default());
        let origin = TrackingOrigin::default();
        let mut first = batch(0, vec![point_sample(Hand::Right, Vector3::new(0.0, 0.0, 1.0))]);
        publisher.publish(&mut first, &origin, 0.1);
        let mut gone = batch(1, Vec::new());
        publisher.publish(&mut gone, &origin, 0.1);
        let mut back = batch(2, vec![point_sample(Hand::Right, Vector3::new(1.0, 0.0, 0.0))]);
        publisher.publish(&mut back, &origin, 0.1);
        let dir = publisher.right().unwrap().pinch.direction;
        assert_abs_diff_eq!(dir, Vector3::x(), epsilon = 1e-5);
    }

    #[test]
    fn test_point_only_result() {
        let mut publisher = ResultPublisher::new(&EngineConfig::default());
        let point = Vector3::new(0.1, 0.2, 0.5);
        let mut b = batch(0, vec![point_sample(Hand::Left, point)]);
        publisher.publish(&mut b, &TrackingOrigin::default(), 0.033);
        let left = publisher.left().unwrap();
        assert_eq!(left.skeleton, SkeletonKind::PointOnly);
        assert_abs_diff_eq!(left.position, point, epsilon = 1e-6);
        assert_abs_diff_eq!(left.pinch.anchor, point, epsilon = 1e-6);
    }

    #[test]
    fn test_rest_pose_result_rotations() {
        let mut publisher = ResultPublisher::new(&EngineConfig::default());
        let mut b = batch(0, vec![full_sample(Hand::Right, 0.0)]);
        publisher.publish(&mut b, &TrackingOrigin::default(), 0.033);
        let right = publisher.right().unwrap();
        for rotation in right.rotations.iter() {
            assert!(rotation.angle() < 1e-3);
        }
    }

    #[test]
    fn test_summary_sexp() {
        let mut publisher = ResultPublisher::new(&EngineConfig::default());
        let mut b = batch(0, vec![full_sample(Hand::Left, 0.9)]);
        publisher.publish(&mut b, &TrackingOrigin::default(), 0.033);
        let sexp = publisher.left().unwrap().summary_sexp();
        assert!(sexp.contains(":hand :left"));
        assert!(sexp.contains(":pinching t"));
        assert!(lexpr::from_str(&sexp).is_ok(), "unparseable: {}", sexp);
    }
}
