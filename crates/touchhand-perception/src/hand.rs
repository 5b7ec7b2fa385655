//! Controller-to-hand pose correction.
//!
//! With the sensor-to-world rotation at identity the runtime reports
//! controller poses in a right-handed frame where the user looks down -Z with
//! +Y up and +X to the right.  Canonical hand space instead wants a pose whose
//! axes line up with an outstretched hand, palm down, fingers forward.
//!
//! Two fixed corrections get us there:
//!
//! - `touch_to_hand`: a half turn about +Y followed (right to left) by a
//!   quarter turn about +X.  This aligns the controller axes with the hand
//!   axes when the hands are held out in front of the user.
//! - a per-hand grip offset: the controller sits in the palm rotated a
//!   quarter turn about its own Z axis (negative for the left hand, positive
//!   for the right) and tilted an eighth turn about X.  Its inverse cancels
//!   the measured rotation of a correctly posed hand.
//!
//! The resulting rotation offset is `inverse(grip) * touch_to_hand`.  The
//! translation offset moves the tracked reference point to the palm, and is
//! mirrored across X for the left hand.
//!
//! A corrected pose is the raw pose composed with the selected offset, so the
//! offset translation is expressed in the controller's local frame.

use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use touchhand_types::Handedness;

use crate::transform::{Quaternion, Transform3D, Vec3};

/// Distance from the tracked reference point to the palm along the
/// controller's length axis, in metres (three inches).
pub const CONTROLLER_LENGTH_OFFSET: f32 = 0.0762;

/// Per-component scale applied to the base translation offset for the left
/// hand.
const LEFT_MIRROR: Vec3 = Vec3::new(-1.0, 1.0, 1.0);

static LEFT_OFFSET: LazyLock<Transform3D> = LazyLock::new(|| derive_offset(Handedness::Left));
static RIGHT_OFFSET: LazyLock<Transform3D> = LazyLock::new(|| derive_offset(Handedness::Right));

// ────────────────────────────────────────────────────────────────────────────
// Pose records
// ────────────────────────────────────────────────────────────────────────────

/// A controller pose as reported by the VR runtime, in device space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RawPoseState {
    /// Unit quaternion.
    pub orientation: Quaternion,
    /// Metres.
    pub position: Vec3,
    /// Metres per second.
    #[serde(default)]
    pub linear_velocity: Vec3,
    /// Radians per second.
    #[serde(default)]
    pub angular_velocity: Vec3,
}

impl RawPoseState {
    /// A stationary pose at `position` with the given orientation.
    pub fn at_rest(position: Vec3, orientation: Quaternion) -> Self {
        Self {
            orientation,
            position,
            ..Self::default()
        }
    }
}

/// A hand pose in canonical hand space, as consumed by the host input
/// pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HandPose {
    pub translation: Vec3,
    pub rotation: Quaternion,
    /// Passed through from the raw record, not frame-corrected.
    pub velocity: Vec3,
    /// Passed through from the raw record, not frame-corrected.
    pub angular_velocity: Vec3,
    pub valid: bool,
}

impl HandPose {
    /// An untracked hand: identity pose, `valid == false`.
    pub fn invalid() -> Self {
        Self::default()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Correction
// ────────────────────────────────────────────────────────────────────────────

/// The fixed correction applied to poses from the given hand's controller.
pub fn hand_offset(hand: Handedness) -> Transform3D {
    match hand {
        Handedness::Left => *LEFT_OFFSET,
        Handedness::Right => *RIGHT_OFFSET,
    }
}

/// Map a raw controller pose into canonical hand space.
///
/// The raw pose is trusted: `orientation` must be a unit quaternion and the
/// vectors finite.  The result is always marked valid.
pub fn correct_pose(hand: Handedness, raw: &RawPoseState) -> HandPose {
    debug_assert!(
        raw.position.is_finite() && raw.orientation.is_finite(),
        "non-finite raw pose: {raw:?}"
    );
    let corrected = Transform3D::new(raw.position, raw.orientation).compose(hand_offset(hand));

    HandPose {
        translation: corrected.translation,
        rotation: corrected.rotation,
        velocity: raw.linear_velocity,
        angular_velocity: raw.angular_velocity,
        valid: true,
    }
}

fn touch_to_hand() -> Quaternion {
    let y_flip = Quaternion::from_axis_angle(Vec3::unit_y(), PI);
    let quarter_x = Quaternion::from_axis_angle(Vec3::unit_x(), FRAC_PI_2);
    y_flip.mul(quarter_x)
}

fn derive_offset(hand: Handedness) -> Transform3D {
    let sign = match hand {
        Handedness::Left => -1.0,
        Handedness::Right => 1.0,
    };
    let quarter_z = Quaternion::from_axis_angle(Vec3::unit_z(), sign * FRAC_PI_2);
    let eighth_x = Quaternion::from_axis_angle(Vec3::unit_x(), FRAC_PI_4);
    let rotation = quarter_z.mul(eighth_x).inverse().mul(touch_to_hand());

    let base = Vec3::new(
        CONTROLLER_LENGTH_OFFSET / 2.0,
        CONTROLLER_LENGTH_OFFSET / 2.0,
        CONTROLLER_LENGTH_OFFSET * 2.0,
    );
    let translation = match hand {
        Handedness::Left => base.mul_elem(LEFT_MIRROR),
        Handedness::Right => base,
    };

    Transform3D::new(translation, rotation)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_1_SQRT_2;

    fn assert_quat_close(a: Quaternion, b: Quaternion) {
        let close = (a.w - b.w).abs() < 1e-5
            && (a.x - b.x).abs() < 1e-5
            && (a.y - b.y).abs() < 1e-5
            && (a.z - b.z).abs() < 1e-5;
        assert!(close, "{a:?} != {b:?}");
    }

    fn assert_vec_close(a: Vec3, b: Vec3) {
        let close =
            (a.x - b.x).abs() < 1e-5 && (a.y - b.y).abs() < 1e-5 && (a.z - b.z).abs() < 1e-5;
        assert!(close, "{a:?} != {b:?}");
    }

    fn sample_orientations() -> Vec<Quaternion> {
        vec![
            Quaternion::identity(),
            Quaternion::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2),
            Quaternion::from_axis_angle(Vec3::unit_y(), 2.5),
            Quaternion::from_axis_angle(Vec3::new(0.0, 0.6, 0.8), -1.1),
            Quaternion::new(0.5, -0.5, 0.5, 0.5),
            Quaternion::new(1.0, 2.0, -3.0, 0.5).normalize(),
        ]
    }

    #[test]
    fn offsets_match_reference_values() {
        let left = hand_offset(Handedness::Left).rotation;
        let right = hand_offset(Handedness::Right).rotation;
        assert_quat_close(left, Quaternion::new(0.270_598, -0.653_281, 0.270_598, -0.653_281));
        assert_quat_close(right, Quaternion::new(-0.270_598, 0.653_281, 0.270_598, -0.653_281));

        assert_vec_close(
            hand_offset(Handedness::Right).translation,
            Vec3::new(0.0381, 0.0381, 0.1524),
        );
    }

    #[test]
    fn rotation_offsets_are_unit() {
        for hand in Handedness::ALL {
            assert!((hand_offset(hand).rotation.norm() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn translation_offsets_mirror_across_x() {
        let right = hand_offset(Handedness::Right).translation;
        let left = hand_offset(Handedness::Left).translation;
        assert_eq!(left, Vec3::new(-right.x, right.y, right.z));
    }

    #[test]
    fn identity_pose_yields_the_offset_itself() {
        let raw = RawPoseState::at_rest(Vec3::zero(), Quaternion::identity());
        for hand in Handedness::ALL {
            let pose = correct_pose(hand, &raw);
            let offset = hand_offset(hand);
            assert_eq!(pose.rotation, offset.rotation);
            assert_eq!(pose.translation, offset.translation);
        }
    }

    #[test]
    fn right_hand_at_origin_moving_along_x() {
        let raw = RawPoseState {
            orientation: Quaternion::identity(),
            position: Vec3::zero(),
            linear_velocity: Vec3::new(1.0, 0.0, 0.0),
            angular_velocity: Vec3::zero(),
        };
        let offset = hand_offset(Handedness::Right);
        let expected = HandPose {
            translation: offset.translation,
            rotation: offset.rotation,
            velocity: Vec3::new(1.0, 0.0, 0.0),
            angular_velocity: Vec3::zero(),
            valid: true,
        };
        assert_eq!(correct_pose(Handedness::Right, &raw), expected);
    }

    #[test]
    fn corrected_rotation_stays_unit() {
        for q in sample_orientations() {
            for hand in Handedness::ALL {
                let raw = RawPoseState::at_rest(Vec3::new(0.1, 1.2, -0.3), q);
                let pose = correct_pose(hand, &raw);
                assert!(
                    (pose.rotation.norm() - 1.0).abs() < 1e-5,
                    "norm drifted for {q:?} / {hand}"
                );
            }
        }
    }

    #[test]
    fn offset_is_applied_in_controller_frame() {
        // Controller yawed a half turn about +Y: the palm offset flips in X and Z.
        let yaw = Quaternion::from_axis_angle(Vec3::unit_y(), PI);
        let position = Vec3::new(0.2, 1.0, -0.4);
        let raw = RawPoseState::at_rest(position, yaw);
        let pose = correct_pose(Handedness::Right, &raw);

        let local = hand_offset(Handedness::Right).translation;
        assert_vec_close(
            pose.translation,
            Vec3::new(position.x - local.x, position.y + local.y, position.z - local.z),
        );
        assert_quat_close(pose.rotation, yaw.mul(hand_offset(Handedness::Right).rotation));
    }

    #[test]
    fn velocities_pass_through_untouched() {
        for q in sample_orientations() {
            let raw = RawPoseState {
                orientation: q,
                position: Vec3::new(1.0, 2.0, 3.0),
                linear_velocity: Vec3::new(-0.25, 3.5, 1e-3),
                angular_velocity: Vec3::new(7.0, -0.125, 0.0),
            };
            for hand in Handedness::ALL {
                let pose = correct_pose(hand, &raw);
                assert_eq!(pose.velocity, raw.linear_velocity);
                assert_eq!(pose.angular_velocity, raw.angular_velocity);
                assert!(pose.valid);
            }
        }
    }

    #[test]
    fn repeated_calls_are_bitwise_identical() {
        let raw = RawPoseState {
            orientation: Quaternion::new(0.5, -0.5, 0.5, 0.5),
            position: Vec3::new(0.3, 1.4, -0.2),
            linear_velocity: Vec3::new(0.1, 0.0, 0.0),
            angular_velocity: Vec3::new(0.0, 0.2, 0.0),
        };
        let a = correct_pose(Handedness::Left, &raw);
        let b = correct_pose(Handedness::Left, &raw);
        let bits = |p: &HandPose| {
            [
                p.translation.x.to_bits(),
                p.translation.y.to_bits(),
                p.translation.z.to_bits(),
                p.rotation.w.to_bits(),
                p.rotation.x.to_bits(),
                p.rotation.y.to_bits(),
                p.rotation.z.to_bits(),
            ]
        };
        assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn correction_is_safe_across_threads() {
        let raw = RawPoseState::at_rest(Vec3::new(0.0, 1.0, 0.0), Quaternion::identity());
        let expected = correct_pose(Handedness::Right, &raw);
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(move || correct_pose(Handedness::Right, &raw)))
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), expected);
        }
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "non-finite raw pose")]
    fn non_finite_raw_pose_is_rejected_in_debug_builds() {
        let raw = RawPoseState::at_rest(Vec3::new(f32::NAN, 0.0, 0.0), Quaternion::identity());
        correct_pose(Handedness::Left, &raw);
    }

    #[test]
    fn invalid_pose_is_not_valid() {
        let pose = HandPose::invalid();
        assert!(!pose.valid);
        assert_eq!(pose.rotation, Quaternion::identity());
    }

    #[test]
    fn raw_pose_parses_without_velocities() {
        let raw: RawPoseState = serde_json::from_str(
            r#"{"orientation":{"w":1.0,"x":0.0,"y":0.0,"z":0.0},"position":{"x":0.0,"y":1.5,"z":0.0}}"#,
        )
        .unwrap();
        assert_eq!(raw.linear_velocity, Vec3::zero());
        assert!((raw.position.y - 1.5).abs() < f32::EPSILON);
    }
}
