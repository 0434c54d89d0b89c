//! Joint orientation reconstruction from raw joint positions.
//!
//! Turns the 21 positions of one hand into 21 orientations.  The rest
//! convention is "palm faces forward (+Z), fingers point up (+Y)": a flat
//! hand with straight fingers reconstructs to identity at every joint.
//!
//! Per finger, one bend normal is derived from the first two bone
//! segments; every joint of the finger is then oriented so that its local
//! Y axis runs along the bone and its local X axis along the bend normal.
//! The tip has no bone of its own and repeats the last joint's rotation.

use nalgebra::{UnitQuaternion, Vector3};

use crate::joints::{Finger, Hand, HandJoint, JOINT_COUNT};

/// Bone segments are scaled up before cross products so that centimeter
/// sized vectors do not vanish below the degeneracy thresholds.
pub const SEGMENT_SCALE: f32 = 100.0;

/// Squared-length threshold below which a direction counts as degenerate.
const DEGENERATE_EPS: f32 = 1e-10;

// ── Types ──────────────────────────────────────────────────

/// 21 orientations in joint taxonomy order.  Index 0 is the palm.
pub type RotationSet = [UnitQuaternion<f32>; JOINT_COUNT];

/// Identity rotation for every joint.
pub fn identity_rotations() -> RotationSet {
    [UnitQuaternion::identity(); JOINT_COUNT]
}

/// Pose of the camera (tracking origin) in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingOrigin {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
}

impl Default for TrackingOrigin {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }
}

/// Whole-hand values derived alongside the per-joint rotations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandFrame {
    /// Palm center.
    pub position: Vector3<f32>,
    /// Palm orientation, equal to `rotations[0]`.
    pub rotation: UnitQuaternion<f32>,
    pub pinch_anchor: Vector3<f32>,
    /// Unit pointing direction of the pinch ray.
    pub pinch_direction: Vector3<f32>,
}

/// Palm axes for one hand.
#[derive(Debug, Clone, Copy)]
pub struct PalmFrame {
    /// Midpoint of wrist and middle-finger base.
    pub center: Vector3<f32>,
    /// Unit palm-outward normal ("forward" in the rest pose).
    pub normal: Vector3<f32>,
    /// Wrist to middle-finger base.
    pub middle_direction: Vector3<f32>,
    /// Wrist to index-finger base.
    pub index_direction: Vector3<f32>,
    /// Unit fallback lateral axis, cross(index direction, normal).
    pub lateral: Vector3<f32>,
}

// ── Vector helpers ─────────────────────────────────────────

fn normalize_or(v: Vector3<f32>, fallback: Vector3<f32>) -> Vector3<f32> {
    if v.norm_squared() < DEGENERATE_EPS {
        fallback
    } else {
        v.normalize()
    }
}

/// Unsigned angle in radians, 0 when either vector is degenerate.
fn angle_between(a: &Vector3<f32>, b: &Vector3<f32>) -> f32 {
    let denom = (a.norm_squared() * b.norm_squared()).sqrt();
    if denom < DEGENERATE_EPS {
        return 0.0;
    }
    (a.dot(b) / denom).clamp(-1.0, 1.0).acos()
}

/// Remove the component of `v` along the unit `axis`.
fn project_onto_plane(v: &Vector3<f32>, axis: &Vector3<f32>) -> Vector3<f32> {
    v - axis * v.dot(axis)
}

/// Normalize `candidate` and flip it into the half-space of `reference`.
/// Falls back to the normalized reference when the candidate is degenerate.
fn orient_along(candidate: Vector3<f32>, reference: &Vector3<f32>) -> Vector3<f32> {
    let reference = normalize_or(*reference, Vector3::x());
    if candidate.norm_squared() < DEGENERATE_EPS {
        return reference;
    }
    let n = candidate.normalize();
    if n.dot(&reference) < 0.0 {
        -n
    } else {
        n
    }
}

/// Rotation whose local +Z points along `forward` and whose local +Y is
/// as close to `up` as possible.
///
/// A degenerate `forward` yields identity.  When `forward` and `up` are
/// collinear a substitute up axis is chosen so the result stays finite.
pub fn look_rotation(forward: &Vector3<f32>, up: &Vector3<f32>) -> UnitQuaternion<f32> {
    if forward.norm_squared() < DEGENERATE_EPS {
        return UnitQuaternion::identity();
    }
    let f = forward.normalize();
    let collinear = f.cross(up).norm_squared() < 1e-8 * up.norm_squared();
    let up = if up.norm_squared() < DEGENERATE_EPS || collinear {
        if f.y.abs() < 0.9 {
            Vector3::y()
        } else {
            Vector3::z()
        }
    } else {
        *up
    };
    UnitQuaternion::face_towards(&f, &up)
}

// ── Palm ───────────────────────────────────────────────────

/// Derive the palm axes.  The cross-product operand order is flipped for
/// the left hand so the normal always points out of the palm.
pub fn palm_frame(points: &[Vector3<f32>; JOINT_COUNT], hand: Hand) -> PalmFrame {
    let wrist = points[HandJoint::Wrist.index()];
    let middle_base = points[HandJoint::MiddleProximal.index()];
    let index_direction = points[HandJoint::IndexProximal.index()] - wrist;
    let middle_direction = middle_base - wrist;

    let raw_normal = match hand {
        Hand::Right => index_direction.cross(&middle_direction),
        Hand::Left => middle_direction.cross(&index_direction),
    };
    let normal = normalize_or(raw_normal, Vector3::z());
    let lateral = normalize_or(index_direction.cross(&normal), Vector3::x());

    PalmFrame {
        center: (wrist + middle_base) * 0.5,
        normal,
        middle_direction,
        index_direction,
        lateral,
    }
}

// ── Finger normals ─────────────────────────────────────────

/// Unsigned bend-normal candidate for two segments.
///
/// Both segments are projected onto the plane orthogonal to the unit
/// `axis`.  When the projected inter-segment angle exceeds both
/// segment-to-forward angles the digit is clearly bent and cross(s1, s2)
/// is used.  Otherwise the segment closer to parallel with `forward` is
/// crossed with `forward`; ties pick s1.
fn bend_candidate(
    s1: &Vector3<f32>,
    s2: &Vector3<f32>,
    forward: &Vector3<f32>,
    axis: &Vector3<f32>,
) -> Vector3<f32> {
    let p1 = project_onto_plane(s1, axis);
    let p2 = project_onto_plane(s2, axis);

    let inter = angle_between(&p1, &p2);
    let a1 = angle_between(&p1, forward);
    let a2 = angle_between(&p2, forward);

    if inter > a1 && inter > a2 {
        s1.cross(s2)
    } else {
        let closer = if a1 <= a2 { s1 } else { s2 };
        closer.cross(forward)
    }
}

/// Bend normal for index, middle, ring, and pinky.
///
/// The candidate is taken in the plane orthogonal to `lateral` with the
/// palm normal as `forward`, then signed into the `lateral` half-space.
/// A vanishing cross product falls back to `lateral` itself.
pub fn finger_normal(
    s1: &Vector3<f32>,
    s2: &Vector3<f32>,
    forward: &Vector3<f32>,
    lateral: &Vector3<f32>,
) -> Vector3<f32> {
    orient_along(bend_candidate(s1, s2, forward, lateral), lateral)
}

/// Bend normal for the thumb.
///
/// Same comparison as the other fingers, projected onto the plane
/// orthogonal to the thumb-axis reference, so bends within the palm plane
/// never flip the axis.  Signed toward the reference combined with the
/// palm normal.
pub fn thumb_normal(
    s1: &Vector3<f32>,
    s2: &Vector3<f32>,
    palm_normal: &Vector3<f32>,
    thumb_reference: &Vector3<f32>,
) -> Vector3<f32> {
    let axis = normalize_or(*thumb_reference, Vector3::x());
    let candidate = bend_candidate(s1, s2, palm_normal, &axis);
    orient_along(candidate, &(axis + palm_normal))
}

/// Thumb-axis reference: pinky base to thumb base, mirrored for the left
/// hand so it points the same way as the right hand's in the rest pose.
fn thumb_reference(points: &[Vector3<f32>; JOINT_COUNT], hand: Hand) -> Vector3<f32> {
    let axis = points[HandJoint::ThumbMetacarpal.index()] - points[HandJoint::PinkyProximal.index()];
    match hand {
        Hand::Right => axis,
        Hand::Left => -axis,
    }
}

fn finger_segments(points: &[Vector3<f32>; JOINT_COUNT], finger: Finger) -> [Vector3<f32>; 3] {
    let [a, b, c, d] = finger.joints();
    [
        (points[b] - points[a]) * SEGMENT_SCALE,
        (points[c] - points[b]) * SEGMENT_SCALE,
        (points[d] - points[c]) * SEGMENT_SCALE,
    ]
}

// ── Reconstruction ─────────────────────────────────────────

/// Reconstruct all 21 orientations of a fully tracked hand into
/// `rotations`, reusing the caller's buffer.
pub fn reconstruct(
    points: &[Vector3<f32>; JOINT_COUNT],
    hand: Hand,
    origin: &TrackingOrigin,
    rotations: &mut RotationSet,
) -> HandFrame {
    let palm = palm_frame(points, hand);
    let palm_rotation = look_rotation(&palm.normal, &palm.middle_direction);
    rotations[HandJoint::Wrist.index()] = palm_rotation;

    let thumb_ref = thumb_reference(points, hand);

    for finger in Finger::ALL {
        let segments = finger_segments(points, finger);
        let normal = match finger {
            Finger::Thumb => thumb_normal(&segments[0], &segments[1], &palm.normal, &thumb_ref),
            _ => finger_normal(&segments[0], &segments[1], &palm.normal, &palm.lateral),
        };

        let joints = finger.joints();
        for (k, segment) in segments.iter().enumerate() {
            rotations[joints[k]] = look_rotation(&normal.cross(segment), segment);
        }
        rotations[joints[3]] = rotations[joints[2]];
    }

    let (pinch_anchor, pinch_direction) = pinch_ray(points, &palm, origin);

    HandFrame {
        position: palm.center,
        rotation: palm_rotation,
        pinch_anchor,
        pinch_direction,
    }
}

/// Pinch ray for a tracked hand.
///
/// The anchor sits at `thumb base + index base - wrist`; the ray points
/// from the midpoint of tracking origin and palm center through it.
pub fn pinch_ray(
    points: &[Vector3<f32>; JOINT_COUNT],
    palm: &PalmFrame,
    origin: &TrackingOrigin,
) -> (Vector3<f32>, Vector3<f32>) {
    let anchor = points[HandJoint::ThumbMetacarpal.index()]
        + points[HandJoint::IndexProximal.index()]
        - points[HandJoint::Wrist.index()];
    let from = (origin.position + palm.center) * 0.5;
    let fallback = palm.normal;
    (anchor, normalize_or(anchor - from, fallback))
}

/// Degenerate reconstruction for point-only samples: everything collapses
/// onto `points[0]`, looking away from the tracking origin.
pub fn reconstruct_point_only(
    point: &Vector3<f32>,
    origin: &TrackingOrigin,
    rotations: &mut RotationSet,
) -> HandFrame {
    let rotation = look_rotation(&(point - origin.position), &Vector3::y());
    rotations.fill(rotation);
    HandFrame {
        position: *point,
        rotation,
        pinch_anchor: *point,
        pinch_direction: rotation * Vector3::z(),
    }
}

// ── Rest pose ──────────────────────────────────────────────

/// Canonical flat "five" for a hand: palm facing +Z, all five digits
/// straight along +Y and spread sideways.  Reconstructs to identity.
pub fn rest_pose(hand: Hand) -> [Vector3<f32>; JOINT_COUNT] {
    // Lateral offset of each digit (right hand, thumb on +X) and its
    // base height above the wrist.
    const DIGITS: [(f32, f32); 5] = [
        (0.045, 0.030),
        (0.022, 0.090),
        (0.0, 0.095),
        (-0.020, 0.090),
        (-0.038, 0.080),
    ];
    const BONES: [f32; 3] = [0.040, 0.025, 0.022];

    let mirror = if hand.is_left() { -1.0 } else { 1.0 };
    let mut points = [Vector3::zeros(); JOINT_COUNT];
    for (finger, (x, base_y)) in Finger::ALL.iter().zip(DIGITS) {
        let joints = finger.joints();
        let mut y = base_y;
        points[joints[0]] = Vector3::new(x * mirror, y, 0.0);
        for (k, bone) in BONES.iter().enumerate() {
            y += bone;
            points[joints[k + 1]] = Vector3::new(x * mirror, y, 0.0);
        }
    }
    points
}
