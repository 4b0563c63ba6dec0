//! Quaternion operations for attitude representation
//!
//! Free functions over nalgebra's raw `Quaternion<f64>` (Hamilton convention,
//! body-to-world). Filters keep a raw quaternion rather than a
//! `UnitQuaternion` so that a diverged (non-finite) state stays observable.
//! - Quaternion derivative: q̇ = 1/2 Λ(q)[0;ω]
//! - Normalization with identity fallback
//! - Conversions to rotation matrix and Euler angles

use nalgebra::{Matrix4, Quaternion, Unit, UnitQuaternion, Vector3, Vector4};

use crate::FLOAT_EPS;

/// Identity quaternion [1, 0, 0, 0]
pub fn identity() -> Quaternion<f64> {
    Quaternion::new(1.0, 0.0, 0.0, 0.0)
}

/// Whether all four components are finite
pub fn is_finite(q: &Quaternion<f64>) -> bool {
    q.coords.iter().all(|c| c.is_finite())
}

/// Scale a quaternion to unit norm
///
/// A quaternion whose norm is below [`FLOAT_EPS`] is replaced by the identity.
/// Non-finite quaternions are returned non-finite so divergence stays visible.
/// Finite components whose squared norm overflows are rescaled by their
/// largest magnitude first.
pub fn normalize_or_identity(q: &Quaternion<f64>) -> Quaternion<f64> {
    if !is_finite(q) {
        return *q;
    }

    let norm = q.norm();
    if norm.is_finite() {
        if norm < FLOAT_EPS {
            return identity();
        }
        return q / norm;
    }

    let scaled = q / q.coords.amax();
    scaled / scaled.norm()
}

/// Compute the quaternion derivative given angular velocity
///
/// q̇ = 1/2 Λ(q)[0;ω]
///
/// # Arguments
/// * `q` - Current orientation
/// * `omega` - Angular velocity in body frame [rad/s]
pub fn quaternion_derivative(q: &Quaternion<f64>, omega: &Vector3<f64>) -> Quaternion<f64> {
    // Λ(q) = [w  -x  -y  -z]
    //        [x   w  -z   y]
    //        [y   z   w  -x]
    //        [z  -y   x   w]
    let (w, x, y, z) = (q.w, q.i, q.j, q.k);

    let omega_quat = Vector4::new(0.0, omega.x, omega.y, omega.z);

    let lambda = Matrix4::new(
        w, -x, -y, -z,
        x,  w, -z,  y,
        y,  z,  w, -x,
        z, -y,  x,  w,
    );

    let d = 0.5 * lambda * omega_quat;
    Quaternion::new(d[0], d[1], d[2], d[3])
}

/// Integrate quaternion using the derivative (first-order Euler step)
///
/// q_new = normalize(q + q̇ * dt)
pub fn integrate_quaternion(
    q: &Quaternion<f64>,
    q_dot: &Quaternion<f64>,
    dt: f64,
) -> Quaternion<f64> {
    normalize_or_identity(&(q + q_dot * dt))
}

/// Map a small rotation vector to a unit quaternion
///
/// Returns the identity when the rotation magnitude is negligible.
pub fn small_angle_quaternion(delta_theta: &Vector3<f64>) -> Quaternion<f64> {
    let angle = delta_theta.norm();
    if angle < FLOAT_EPS {
        return identity();
    }
    let axis = delta_theta / angle;
    let half = 0.5 * angle;
    let s = half.sin();
    Quaternion::new(half.cos(), s * axis.x, s * axis.y, s * axis.z)
}

/// Rotation matrix R(q) of a unit quaternion (body to world)
pub fn rotation_matrix(q: &Quaternion<f64>) -> nalgebra::Matrix3<f64> {
    let (w, x, y, z) = (q.w, q.i, q.j, q.k);
    nalgebra::Matrix3::new(
        1.0 - 2.0 * (y * y + z * z), 2.0 * (x * y - w * z),       2.0 * (x * z + w * y),
        2.0 * (x * y + w * z),       1.0 - 2.0 * (x * x + z * z), 2.0 * (y * z - w * x),
        2.0 * (x * z - w * y),       2.0 * (y * z + w * x),       1.0 - 2.0 * (x * x + y * y),
    )
}

/// Roll, pitch, yaw of a unit quaternion
///
/// Extrinsic x-y-z sequence, R = Rz(yaw) * Ry(pitch) * Rx(roll).
pub fn euler_angles(q: &Quaternion<f64>, degrees: bool) -> Vector3<f64> {
    let (roll, pitch, yaw) = UnitQuaternion::new_unchecked(*q).euler_angles();
    let angles = Vector3::new(roll, pitch, yaw);
    if degrees {
        angles.map(f64::to_degrees)
    } else {
        angles
    }
}

/// Compute quaternion from axis-angle representation
///
/// # Arguments
/// * `axis` - Rotation axis (will be normalized)
/// * `angle` - Rotation angle [rad]
pub fn quaternion_from_axis_angle(axis: &Vector3<f64>, angle: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_axis_angle(&Unit::new_normalize(*axis), angle)
}

/// Compute the angular velocity from two quaternions and time step
///
/// Useful for numerical differentiation of synthetic trajectories.
///
/// # Returns
/// Angular velocity in body frame [rad/s]
pub fn angular_velocity_from_quaternions(
    q1: &UnitQuaternion<f64>,
    q2: &UnitQuaternion<f64>,
    dt: f64,
) -> Vector3<f64> {
    // q2 = q1 ⊗ Δq, so Δq = q1^(-1) ⊗ q2
    let mut delta_q = (q1.inverse() * q2).into_inner();
    if delta_q.w < 0.0 {
        delta_q = -delta_q;
    }

    let angle = 2.0 * delta_q.w.clamp(-1.0, 1.0).acos();

    if angle.abs() < 1e-12 {
        return Vector3::zeros();
    }

    let axis = Vector3::new(delta_q.i, delta_q.j, delta_q.k);
    let axis_norm = axis.norm();

    if axis_norm < 1e-12 {
        return Vector3::zeros();
    }

    (angle / dt) * (axis / axis_norm)
}
