//! Orientation filters
//!
//! Each filter fuses one sensor's accelerometer and gyroscope samples into a
//! body-to-world unit quaternion:
//! - [`Madgwick`]: gradient-descent complementary filter (`complementary-1`)
//! - [`Mahony`]: proportional-integral complementary filter (`complementary-2`)
//! - [`ErrorStateEkf`]: error-state Extended Kalman Filter with gyro bias (`ekf`)
//!
//! `update` never fails on numerically pathological input. A zero-norm
//! accelerometer reading (or a vanishing correction) skips the correction
//! step. The complementary filters may still diverge to a non-finite
//! quaternion for inputs far outside their gain/rate envelope; callers detect
//! that through [`OrientationFilter::is_finite`].

pub mod madgwick;
pub mod mahony;
pub mod ekf;

pub use madgwick::*;
pub use mahony::*;
pub use ekf::*;

use nalgebra::{Quaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{ensure_finite, CoreError};
use crate::math;
use crate::{Mat3, Vec3};

/// Quaternion holder composed into every filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attitude {
    q: Quaternion<f64>,
}

impl Default for Attitude {
    fn default() -> Self {
        Self { q: math::identity() }
    }
}

impl Attitude {
    /// Current quaternion [w, x, y, z]
    pub fn quaternion(&self) -> Quaternion<f64> {
        self.q
    }

    /// Overwrite the quaternion without normalizing it
    pub fn set_raw(&mut self, q: Quaternion<f64>) {
        self.q = q;
    }

    /// Store `q` scaled to unit norm (zero norm becomes identity)
    pub fn set_normalized(&mut self, q: Quaternion<f64>) {
        self.q = math::normalize_or_identity(&q);
    }

    /// Re-normalize in place
    pub fn normalize(&mut self) {
        self.q = math::normalize_or_identity(&self.q);
    }

    pub fn is_finite(&self) -> bool {
        math::is_finite(&self.q)
    }

    pub fn rotation_matrix(&self) -> Mat3 {
        math::rotation_matrix(&self.q)
    }

    pub fn euler_angles(&self, degrees: bool) -> Vec3 {
        math::euler_angles(&self.q, degrees)
    }
}

/// Optional initial state for [`OrientationFilter::reset`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FilterInit {
    /// Initial orientation, normalized on reset
    pub quaternion: Option<Quaternion<f64>>,
    /// Initial gyroscope bias estimate [rad/s]
    pub bias: Option<Vec3>,
}

impl FilterInit {
    /// Check every supplied component is finite
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(q) = &self.quaternion {
            if !math::is_finite(q) {
                return Err(CoreError::NonFinite {
                    what: "initial quaternion",
                });
            }
        }
        if let Some(b) = &self.bias {
            ensure_finite("initial bias", b)?;
        }
        Ok(())
    }
}

/// Common contract of all orientation filters
pub trait OrientationFilter {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    /// Restore initial conditions, optionally seeding orientation and bias
    fn reset(&mut self, init: FilterInit) -> Result<(), CoreError>;

    /// Process one accelerometer [m/s²] / gyroscope [rad/s] sample
    ///
    /// Fails only on non-finite input, before mutating any state.
    fn update(&mut self, acc: &Vec3, gyro: &Vec3) -> Result<Quaternion<f64>, CoreError>;

    fn attitude(&self) -> &Attitude;

    fn attitude_mut(&mut self) -> &mut Attitude;

    /// Number of updates whose accelerometer correction was skipped
    fn skipped_corrections(&self) -> u64;

    fn quaternion(&self) -> Quaternion<f64> {
        self.attitude().quaternion()
    }

    fn rotation_matrix(&self) -> Mat3 {
        self.attitude().rotation_matrix()
    }

    /// Roll, pitch, yaw (extrinsic x-y-z)
    fn euler_angles(&self, degrees: bool) -> Vec3 {
        self.attitude().euler_angles(degrees)
    }

    fn is_finite(&self) -> bool {
        self.attitude().is_finite()
    }
}

/// Validate one accelerometer/gyroscope pair
pub(crate) fn validate_sample(acc: &Vec3, gyro: &Vec3) -> Result<(), CoreError> {
    ensure_finite("accelerometer sample", acc)?;
    ensure_finite("gyroscope sample", gyro)
}

/// Unit accelerometer direction, or `None` when the norm is degenerate
pub(crate) fn unit_acceleration(acc: &Vec3) -> Option<Vector3<f64>> {
    let norm = acc.norm();
    if norm < crate::FLOAT_EPS {
        None
    } else {
        Some(acc / norm)
    }
}

/// Closed set of filter variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterKind {
    /// Madgwick gradient-descent filter
    ComplementaryV1,
    /// Mahony proportional-integral filter
    ComplementaryV2,
    /// Error-state Extended Kalman Filter
    Ekf,
}

impl FilterKind {
    /// Parse a configuration name
    ///
    /// Accepts `complementary-1`/`madgwick`, `complementary-2`/`mahony` and
    /// `ekf`, case-insensitively. Returns `None` for anything else.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "complementary-1" | "madgwick" => Some(Self::ComplementaryV1),
            "complementary-2" | "mahony" => Some(Self::ComplementaryV2),
            "ekf" => Some(Self::Ekf),
            _ => None,
        }
    }

    /// Canonical configuration name
    pub fn name(&self) -> &'static str {
        match self {
            Self::ComplementaryV1 => "complementary-1",
            Self::ComplementaryV2 => "complementary-2",
            Self::Ekf => "ekf",
        }
    }

    /// Instantiate a filter of this kind
    pub fn build(
        &self,
        frequency: f64,
        params: &FilterParams,
    ) -> Result<Box<dyn OrientationFilter + Send>, CoreError> {
        Ok(match self {
            Self::ComplementaryV1 => Box::new(Madgwick::new(frequency, params.madgwick)?),
            Self::ComplementaryV2 => Box::new(Mahony::new(frequency, params.mahony)?),
            Self::Ekf => Box::new(ErrorStateEkf::new(frequency, params.ekf.clone())?),
        })
    }
}

impl Default for FilterKind {
    fn default() -> Self {
        Self::ComplementaryV1
    }
}

/// Tuning of every filter variant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    pub madgwick: MadgwickParams,
    pub mahony: MahonyParams,
    pub ekf: EkfParams,
}
