//! Two-axis decomposition of the forearm/upper-arm relative rotation
//!
//! R_rel = R_Aᵀ R_B = Rot(j_ps, PS) · Rot(j_fe, FE)
//!
//! PS is the twist of R_rel about j_ps (forearm frame); FE is what remains
//! after removing it, measured about j_fe (upper-arm frame).

use nalgebra::Quaternion;

use super::{JointAngles, MountingAxes};
use crate::math::quaternion_from_matrix;
use crate::{Mat3, Vec3};

/// Relative rotation R_Aᵀ R_B
pub fn relative_rotation(r_a: &Mat3, r_b: &Mat3) -> Mat3 {
    r_a.transpose() * r_b
}

/// Signed rotation angle of `q` about unit `axis` [rad]
fn twist_angle(q: &Quaternion<f64>, axis: &Vec3) -> f64 {
    2.0 * q.imag().dot(axis).atan2(q.w)
}

/// Split a relative rotation into FE and PS angles [deg]
///
/// Non-finite input yields [`JointAngles::undefined`].
pub fn decompose(r_rel: &Mat3, axes: &MountingAxes) -> JointAngles {
    if r_rel.iter().any(|v| !v.is_finite()) {
        return JointAngles::undefined();
    }

    let mut q = quaternion_from_matrix(r_rel).into_inner();
    if q.w < 0.0 {
        q = -q;
    }

    let ps = twist_angle(&q, &axes.pronation);
    let half = 0.5 * ps;
    let s = half.sin();
    let twist = Quaternion::new(
        half.cos(),
        s * axes.pronation.x,
        s * axes.pronation.y,
        s * axes.pronation.z,
    );

    let swing = twist.conjugate() * q;
    let fe = twist_angle(&swing, &axes.flexion);

    JointAngles::new(fe.to_degrees(), ps.to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::quaternion_from_axis_angle;
    use approx::assert_relative_eq;

    fn rot(axis: Vec3, deg: f64) -> Mat3 {
        *quaternion_from_axis_angle(&axis, deg.to_radians())
            .to_rotation_matrix()
            .matrix()
    }

    #[test]
    fn test_identity_is_zero() {
        let angles = decompose(&Mat3::identity(), &MountingAxes::default());

        assert_relative_eq!(angles.flexion_deg, 0.0, epsilon = 1e-12);
        assert_relative_eq!(angles.pronation_deg, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pure_flexion() {
        let angles = decompose(&rot(Vec3::y(), 30.0), &MountingAxes::default());

        assert_relative_eq!(angles.flexion_deg, 30.0, epsilon = 1e-9);
        assert_relative_eq!(angles.pronation_deg, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_pure_pronation() {
        let angles = decompose(&rot(Vec3::x(), -50.0), &MountingAxes::default());

        assert_relative_eq!(angles.flexion_deg, 0.0, epsilon = 1e-9);
        assert_relative_eq!(angles.pronation_deg, -50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_combined_rotation() {
        let r_rel = rot(Vec3::x(), 40.0) * rot(Vec3::y(), 75.0);
        let angles = decompose(&r_rel, &MountingAxes::default());

        assert_relative_eq!(angles.flexion_deg, 75.0, epsilon = 1e-9);
        assert_relative_eq!(angles.pronation_deg, 40.0, epsilon = 1e-9);
    }

    #[test]
    fn test_independent_of_common_rotation() {
        let common = rot(Vec3::new(0.3, -1.0, 0.5), 70.0);
        let r_rel = rot(Vec3::x(), -20.0) * rot(Vec3::y(), 45.0);
        let r_a = common;
        let r_b = common * r_rel;

        let angles = decompose(&relative_rotation(&r_a, &r_b), &MountingAxes::default());

        assert_relative_eq!(angles.flexion_deg, 45.0, epsilon = 1e-9);
        assert_relative_eq!(angles.pronation_deg, -20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_non_finite_is_undefined() {
        let mut r = Mat3::identity();
        r[(1, 2)] = f64::NAN;

        assert!(!decompose(&r, &MountingAxes::default()).is_finite());
    }
}
