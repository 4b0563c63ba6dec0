//! # Elbow Core
//!
//! Orientation estimation and joint-angle derivation for a pair of body-worn
//! IMUs (sensor A on the forearm, sensor B on the upper arm).
//!
//! ## Modules
//!
//! - [`math`]: Quaternion, SO(3) and angle helpers
//! - [`filter`]: Orientation filters (Madgwick, Mahony, error-state EKF)
//! - [`calibration`]: Gyroscope zero-rate bias estimation and removal
//! - [`estimation`]: Flexion/extension and pronation/supination estimators
//! - [`sample`]: IMU sample types shared by all stages

pub mod error;
pub mod math;
pub mod sample;
pub mod filter;
pub mod calibration;
pub mod estimation;

pub use error::CoreError;

// Common type aliases
use nalgebra::{Matrix3, Vector3};

/// 3D vector type
pub type Vec3 = Vector3<f64>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f64>;

/// Gravity constant [m/s²]
pub const GRAVITY: f64 = 9.81;

/// Sample rate used when a configuration does not name one [Hz]
pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 100.0;

/// Norm below which vectors and quaternions are treated as degenerate
pub const FLOAT_EPS: f64 = 1e-9;

/// Gravity direction in the world frame (z-up)
pub fn gravity_up() -> Vec3 {
    Vec3::new(0.0, 0.0, 1.0)
}
