//! Mahony explicit complementary filter (IMU form)
//!
//! e = â × v̂,  v̂ = R(q)ᵀ e_z
//! ḃ = -k_I e
//! q̇ = 1/2 q ⊗ [0, ω - b + k_P e]

use nalgebra::Quaternion;
use serde::{Deserialize, Serialize};

use super::{unit_acceleration, validate_sample, Attitude, FilterInit, OrientationFilter};
use crate::error::{ensure_parameter, sample_period, CoreError};
use crate::math::{gravity_in_body, quaternion_derivative};
use crate::Vec3;

/// Mahony tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MahonyParams {
    /// Proportional feedback gain
    pub kp: f64,
    /// Integral (bias estimation) gain
    pub ki: f64,
}

impl Default for MahonyParams {
    fn default() -> Self {
        Self { kp: 1.0, ki: 0.3 }
    }
}

/// Complementary filter variant 2
#[derive(Debug, Clone)]
pub struct Mahony {
    attitude: Attitude,
    /// Integral term: running gyro bias estimate [rad/s]
    bias: Vec3,
    kp: f64,
    ki: f64,
    dt: f64,
    skipped: u64,
}

impl Mahony {
    pub fn new(frequency: f64, params: MahonyParams) -> Result<Self, CoreError> {
        let dt = sample_period(frequency)?;
        Ok(Self {
            attitude: Attitude::default(),
            bias: Vec3::zeros(),
            kp: ensure_parameter("mahony.kp", params.kp)?,
            ki: ensure_parameter("mahony.ki", params.ki)?,
            dt,
            skipped: 0,
        })
    }

    /// Current integral bias estimate [rad/s]
    pub fn bias(&self) -> Vec3 {
        self.bias
    }
}

impl OrientationFilter for Mahony {
    fn name(&self) -> &'static str {
        "complementary-2"
    }

    fn reset(&mut self, init: FilterInit) -> Result<(), CoreError> {
        init.validate()?;
        match init.quaternion {
            Some(q) => self.attitude.set_normalized(q),
            None => self.attitude = Attitude::default(),
        }
        self.bias = init.bias.unwrap_or_else(Vec3::zeros);
        self.skipped = 0;
        Ok(())
    }

    fn update(&mut self, acc: &Vec3, gyro: &Vec3) -> Result<Quaternion<f64>, CoreError> {
        validate_sample(acc, gyro)?;

        let q = self.attitude.quaternion();
        let mut feedback = Vec3::zeros();

        match unit_acceleration(acc) {
            Some(a) => {
                let v = gravity_in_body(&self.attitude.rotation_matrix());
                let error = a.cross(&v);
                self.bias -= error * (self.ki * self.dt);
                feedback = error * self.kp;
            }
            None => {
                self.skipped += 1;
                tracing::trace!(filter = self.name(), "gravity correction skipped");
            }
        }

        let omega = gyro - self.bias + feedback;
        let q_dot = quaternion_derivative(&q, &omega);
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
