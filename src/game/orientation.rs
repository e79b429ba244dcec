//! Angle-based orientation model
//!
//! World axes follow the render convention: +Y is up, the airplane's nose
//! points down -Z when heading and pitch are both zero, +X is to its right.
//! Heading turns left for positive values, pitch raises the nose.

use glam::{Quat, Vec3};

/// Unit forward vector of an unrotated airplane
pub const FORWARD: Vec3 = Vec3::NEG_Z;
/// World up axis
pub const WORLD_UP: Vec3 = Vec3::Y;

/// Compose yaw about world up with pitch about the yawed right axis.
///
/// Yaw is applied first so pitch stays local to the yawed frame; rebuilding
/// from the two angles every frame means roll can never creep in.
pub fn build_rotation(heading: f32, pitch: f32) -> Quat {
    Quat::from_rotation_y(heading) * Quat::from_rotation_x(pitch)
}

/// Recover `(heading, pitch)` from an externally supplied rotation.
///
/// Only used when importing a rotation (respawn reset, legacy state); the
/// angles are authoritative once a flight controller owns them.
pub fn extract_angles(rotation: Quat) -> (f32, f32) {
    let forward = rotation * FORWARD;
    let heading = (-forward.x).atan2(-forward.z);
    let pitch = forward.y.clamp(-1.0, 1.0).asin();
    (heading, pitch)
}

/// Forward direction of a rotation
pub fn forward(rotation: Quat) -> Vec3 {
    rotation * FORWARD
}

/// Up direction of a rotation
pub fn up(rotation: Quat) -> Vec3 {
    rotation * WORLD_UP
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_3, PI, TAU};

    fn same_angle(a: f32, b: f32) -> bool {
        let diff = (a - b).rem_euclid(TAU);
        diff < 1e-4 || TAU - diff < 1e-4
    }

    #[test]
    fn identity_faces_negative_z() {
        let rotation = build_rotation(0.0, 0.0);
        assert!(forward(rotation).abs_diff_eq(Vec3::NEG_Z, 1e-6));
        assert!(up(rotation).abs_diff_eq(Vec3::Y, 1e-6));
    }

    #[test]
    fn positive_heading_turns_left() {
        let rotation = build_rotation(0.5, 0.0);
        assert!(forward(rotation).x < 0.0);
    }

    #[test]
    fn positive_pitch_raises_nose() {
        let rotation = build_rotation(1.3, 0.4);
        assert!((forward(rotation).y - 0.4_f32.sin()).abs() < 1e-5);
    }

    #[test]
    fn angles_survive_a_round_trip() {
        let headings = [-7.0, -PI, -1.0, 0.0, 0.3, 2.5, PI, 9.0];
        let pitches = [-FRAC_PI_3, -0.7, 0.0, 0.2, FRAC_PI_3];
        for &heading in &headings {
            for &pitch in &pitches {
                let (h, p) = extract_angles(build_rotation(heading, pitch));
                assert!((p - pitch).abs() < 1e-4, "pitch {pitch} came back as {p}");
                assert!(same_angle(h, heading), "heading {heading} came back as {h}");
            }
        }
    }

    #[test]
    fn extraction_tolerates_vertical_forward() {
        let rotation = Quat::from_rotation_x(PI / 2.0);
        let (_, pitch) = extract_angles(rotation);
        assert!(pitch.is_finite());
        assert!((pitch - PI / 2.0).abs() < 1e-3);
    }
}
