//! SO(3) rotation utilities

use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};

use crate::gravity_up;

/// Skew-symmetric matrix from vector (hat operator)
///
/// For v = [x, y, z]^T:
/// ```text
/// [v]× = [ 0  -z   y]
///        [ z   0  -x]
///        [-y   x   0]
/// ```
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -v.z, v.y,
        v.z, 0.0, -v.x,
        -v.y, v.x, 0.0,
    )
}

/// Whether `RᵗR` is the identity within `tol` (max absolute deviation)
pub fn is_orthonormal(r: &Matrix3<f64>, tol: f64) -> bool {
    (r.transpose() * r - Matrix3::identity()).amax() <= tol
}

/// Direction of gravity (world z-up) expressed in the body frame
///
/// p = R(q)^T * [0, 0, 1]^T
pub fn gravity_in_body(r: &Matrix3<f64>) -> Vector3<f64> {
    r.transpose() * gravity_up()
}

/// Unit quaternion of a rotation matrix
///
/// The matrix is assumed orthonormal.
pub fn quaternion_from_matrix(r: &Matrix3<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(*r))
}

/// Unit vector from spherical coordinates
///
/// `theta` is the polar angle from +z, `phi` the azimuth from +x.
pub fn unit_from_spherical(theta: f64, phi: f64) -> Vector3<f64> {
    Vector3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos())
}

/// Spherical coordinates (theta, phi) of a non-zero vector
pub fn spherical_from_vector(v: &Vector3<f64>) -> (f64, f64) {
    let u = v.normalize();
    (u.z.clamp(-1.0, 1.0).acos(), u.y.atan2(u.x))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_skew_symmetric() {
        let v = Vector3::new(1.0, 2.0, 3.0);
        let s = skew(&v);

        // Skew symmetric: S^T = -S
        assert_relative_eq!(s, -s.transpose(), epsilon = 1e-12);

        // a × b = [a]× * b
        let b = Vector3::new(-0.5, 0.25, 4.0);
        assert_relative_eq!(s * b, v.cross(&b), epsilon = 1e-12);
    }

    #[test]
    fn test_gravity_in_body_identity() {
        let p = gravity_in_body(&Matrix3::identity());

        assert_relative_eq!(p, Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_gravity_in_body_rotated() {
        // Body pitched +90° about y: world z lies along body -x
        let q = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), PI / 2.0);
        let p = gravity_in_body(q.to_rotation_matrix().matrix());

        assert_relative_eq!(p, Vector3::new(-1.0, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_orthonormal_check() {
        let q = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.3);
        assert!(is_orthonormal(q.to_rotation_matrix().matrix(), 1e-9));
        assert!(!is_orthonormal(&(Matrix3::identity() * 1.1), 1e-4));
    }

    #[test]
    fn test_spherical_roundtrip_on_equator() {
        let v = Vector3::new(0.0, 1.0, 0.0);
        let (theta, phi) = spherical_from_vector(&v);

        assert_relative_eq!(theta, PI / 2.0, epsilon = 1e-12);
        assert_relative_eq!(phi, PI / 2.0, epsilon = 1e-12);
        assert_relative_eq!(unit_from_spherical(theta, phi), v, epsilon = 1e-12);
    }

    #[test]
    fn test_quaternion_from_matrix() {
        let q = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.4);
        let recovered = quaternion_from_matrix(q.to_rotation_matrix().matrix());

        assert_relative_eq!(recovered.angle_to(&q), 0.0, epsilon = 1e-9);
    }
}
