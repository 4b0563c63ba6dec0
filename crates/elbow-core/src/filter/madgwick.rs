//! Madgwick gradient-descent orientation filter (IMU form, no magnetometer)
//!
//! q̇ = 1/2 q ⊗ [0, ω] - β ∇f / |∇f|
//!
//! where f(q) = R(q)ᵀ e_z - â is the mismatch between the predicted and the
//! measured gravity direction in the body frame.

use nalgebra::Quaternion;
use serde::{Deserialize, Serialize};

use super::{unit_acceleration, validate_sample, Attitude, FilterInit, OrientationFilter};
use crate::error::{ensure_parameter, sample_period, CoreError};
use crate::math::quaternion_derivative;
use crate::{Vec3, FLOAT_EPS};

/// Madgwick tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MadgwickParams {
    /// Gradient step gain β
    pub gain: f64,
}

impl Default for MadgwickParams {
    fn default() -> Self {
        Self { gain: 0.033 }
    }
}

/// Complementary filter variant 1
#[derive(Debug, Clone)]
pub struct Madgwick {
    attitude: Attitude,
    gain: f64,
    dt: f64,
    skipped: u64,
}

impl Madgwick {
    pub fn new(frequency: f64, params: MadgwickParams) -> Result<Self, CoreError> {
        let dt = sample_period(frequency)?;
        let gain = ensure_parameter("madgwick.gain", params.gain)?;
        Ok(Self {
            attitude: Attitude::default(),
            gain,
            dt,
            skipped: 0,
        })
    }

    /// Normalized objective gradient, or `None` when it vanishes
    fn gradient(q: &Quaternion<f64>, a: &Vec3) -> Option<Quaternion<f64>> {
        let (q0, q1, q2, q3) = (q.w, q.i, q.j, q.k);

        let f1 = 2.0 * (q1 * q3 - q0 * q2) - a.x;
        let f2 = 2.0 * (q0 * q1 + q2 * q3) - a.y;
        let f3 = 2.0 * (0.5 - q1 * q1 - q2 * q2) - a.z;

        // Jᵀ f
        let s0 = -2.0 * q2 * f1 + 2.0 * q1 * f2;
        let s1 = 2.0 * q3 * f1 + 2.0 * q0 * f2 - 4.0 * q1 * f3;
        let s2 = -2.0 * q0 * f1 + 2.0 * q3 * f2 - 4.0 * q2 * f3;
        let s3 = 2.0 * q1 * f1 + 2.0 * q2 * f2;

        let gradient = Quaternion::new(s0, s1, s2, s3);
        let norm = gradient.norm();
        if norm < FLOAT_EPS {
            None
        } else {
            Some(gradient / norm)
        }
    }
}

impl OrientationFilter for Madgwick {
    fn name(&self) -> &'static str {
        "complementary-1"
    }

    fn reset(&mut self, init: FilterInit) -> Result<(), CoreError> {
        init.validate()?;
        match init.quaternion {
            Some(q) => self.attitude.set_normalized(q),
            None => self.attitude = Attitude::default(),
        }
        self.skipped = 0;
        Ok(())
    }

    fn update(&mut self, acc: &Vec3, gyro: &Vec3) -> Result<Quaternion<f64>, CoreError> {
        validate_sample(acc, gyro)?;

        let q = self.attitude.quaternion();
        let mut q_dot = quaternion_derivative(&q, gyro);

        match unit_acceleration(acc).and_then(|a| Self::gradient(&q, &a)) {
            Some(step) => q_dot = q_dot - step * self.gain,
            None => {
                self.skipped += 1;
                tracing::trace!(filter = self.name(), "gravity correction skipped");
            }
        }

        self.attitude.set_normalized(q + q_dot * self.dt);
        Ok(self.attitude.quaternion())
    }

    fn attitude(&self) -> &Attitude {
        &self.attitude
    }

    fn attitude_mut(&mut self) -> &mut Attitude {
        &mut self.attitude
    }

    fn skipped_corrections(&self) -> u64 {
        self.skipped
    }
}
