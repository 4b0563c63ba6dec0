//! Error-state Extended Kalman Filter (EKF) for orientation and gyro bias
//!
//! Nominal state: unit quaternion q and gyroscope bias b.
//! Error state: δx = [δθ, δb] (6), with the orientation error applied on the
//! body side, q_true = q ⊗ δq(δθ).
//!
//! Prediction (gyroscope):
//! ```text
//! ω = ω_m - b
//! q ← normalize(q + 1/2 q ⊗ [0, ω] dt)
//! F = I + dt [ -[ω]×  -I ]
//!            [   0     0 ]
//! P ← F P Fᵀ + Q
//! ```
//!
//! Correction (accelerometer as gravity direction):
//! ```text
//! p = R(q)ᵀ e_z,  y = â - p,  H = [ [p]×  0 ]
//! K = P Hᵀ (H P Hᵀ + R)⁻¹
//! P ← (I - K H) P (I - K H)ᵀ + K R Kᵀ   (Joseph form)
//! ```

use nalgebra::{Matrix3, Matrix3x6, Matrix6, Quaternion, Vector6};
use serde::{Deserialize, Serialize};

use super::{unit_acceleration, validate_sample, Attitude, FilterInit, OrientationFilter};
use crate::error::{ensure_parameter, sample_period, CoreError};
use crate::math::{gravity_in_body, quaternion_derivative, skew, small_angle_quaternion};
use crate::Vec3;

/// EKF noise parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EkfParams {
    /// Gyroscope noise density [rad/s/√Hz]
    pub gyro_noise: f64,
    /// Gyroscope bias random walk density [rad/s²/√Hz]
    pub bias_random_walk: f64,
    /// Accelerometer direction noise density
    pub acc_noise: f64,
    /// Initial 6x6 covariance as rows; `None` uses 0.01·I
    pub initial_covariance: Option<Vec<Vec<f64>>>,
}

impl Default for EkfParams {
    fn default() -> Self {
        Self {
            gyro_noise: 0.02,
            bias_random_walk: 0.001,
            acc_noise: 0.03,
            initial_covariance: None,
        }
    }
}

impl EkfParams {
    /// Validated initial covariance
    fn covariance_template(&self) -> Result<Matrix6<f64>, CoreError> {
        let Some(rows) = &self.initial_covariance else {
            return Ok(Matrix6::identity() * 0.01);
        };

        if rows.len() != 6 {
            return Err(CoreError::InvalidCovariance {
                rows: rows.len(),
                cols: rows.first().map_or(0, Vec::len),
            });
        }
        if let Some(bad) = rows.iter().find(|row| row.len() != 6) {
            return Err(CoreError::InvalidCovariance {
                rows: rows.len(),
                cols: bad.len(),
            });
        }

        let p = Matrix6::from_fn(|i, j| rows[i][j]);
        if p.iter().any(|v| !v.is_finite()) {
            return Err(CoreError::NonFinite {
                what: "initial covariance",
            });
        }
        Ok(p)
    }
}

/// Error-state EKF orientation filter
#[derive(Debug, Clone)]
pub struct ErrorStateEkf {
    attitude: Attitude,
    /// Gyroscope bias estimate [rad/s]
    bias: Vec3,
    /// Error-state covariance
    p: Matrix6<f64>,
    p_initial: Matrix6<f64>,
    gyro_noise: f64,
    bias_random_walk: f64,
    acc_noise: f64,
    dt: f64,
    skipped: u64,
}

impl ErrorStateEkf {
    /// Create a filter running at `frequency` Hz
    ///
    /// All parameters are validated before the filter exists.
    pub fn new(frequency: f64, params: EkfParams) -> Result<Self, CoreError> {
        let dt = sample_period(frequency)?;
        let p_initial = params.covariance_template()?;

        Ok(Self {
            attitude: Attitude::default(),
            bias: Vec3::zeros(),
            p: p_initial,
            p_initial,
            gyro_noise: ensure_parameter("ekf.gyro_noise", params.gyro_noise)?,
            bias_random_walk: ensure_parameter("ekf.bias_random_walk", params.bias_random_walk)?,
            acc_noise: ensure_parameter("ekf.acc_noise", params.acc_noise)?,
            dt,
            skipped: 0,
        })
    }

    /// Current gyroscope bias estimate [rad/s]
    pub fn bias(&self) -> Vec3 {
        self.bias
    }

    /// Current error-state covariance
    pub fn covariance(&self) -> &Matrix6<f64> {
        &self.p
    }

    /// Prediction step from one gyroscope sample
    fn predict(&mut self, gyro: &Vec3) {
        let dt = self.dt;
        let omega = gyro - self.bias;

        let q = self.attitude.quaternion();
        let q_dot = quaternion_derivative(&q, &omega);
        self.attitude.set_normalized(q + q_dot * dt);

        let mut f_mat = Matrix6::identity();
        f_mat
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&(Matrix3::identity() - skew(&omega) * dt));
        f_mat
            .fixed_view_mut::<3, 3>(0, 3)
            .copy_from(&(-Matrix3::identity() * dt));

        let mut q_mat = Matrix6::zeros();
        q_mat
            .fixed_view_mut::<3, 3>(0, 0)
            .fill_diagonal(self.gyro_noise.powi(2) * dt);
        q_mat
            .fixed_view_mut::<3, 3>(3, 3)
            .fill_diagonal(self.bias_random_walk.powi(2) * dt);

        // Covariance prediction: P = F * P * F' + Q
        self.p = f_mat * self.p * f_mat.transpose() + q_mat;
    }

    /// Correction step from one accelerometer sample
    ///
    /// Returns `false` when the correction was skipped (zero-norm acceleration
    /// or a non positive-definite innovation covariance).
    fn correct(&mut self, acc: &Vec3) -> bool {
        let Some(measured) = unit_acceleration(acc) else {
            return false;
        };

        let predicted = gravity_in_body(&self.attitude.rotation_matrix());
        let innovation = measured - predicted;

        let mut h_mat = Matrix3x6::zeros();
        h_mat.fixed_view_mut::<3, 3>(0, 0).copy_from(&skew(&predicted));

        let r_mat = Matrix3::identity() * self.acc_noise.powi(2);

        // Innovation covariance: S = H * P * H' + R
        let ph_t = self.p * h_mat.transpose();
        let s = h_mat * ph_t + r_mat;

        // Kalman gain: K = P * H' * S^(-1), S symmetric
        let Some(chol) = s.cholesky() else {
            return false;
        };
        let k = chol.solve(&ph_t.transpose()).transpose();

        let correction: Vector6<f64> = k * innovation;
        let delta_theta = correction.fixed_rows::<3>(0).into_owned();
        let delta_bias = correction.fixed_rows::<3>(3).into_owned();

        let q = self.attitude.quaternion();
        self.attitude.set_normalized(q * small_angle_quaternion(&delta_theta));
        self.bias += delta_bias;

        // Covariance update (Joseph form for numerical stability)
        let i_kh = Matrix6::identity() - k * h_mat;
        self.p = i_kh * self.p * i_kh.transpose() + k * r_mat * k.transpose();

        true
    }
}

impl OrientationFilter for ErrorStateEkf {
    fn name(&self) -> &'static str {
        "ekf"
    }

    fn reset(&mut self, init: FilterInit) -> Result<(), CoreError> {
        init.validate()?;
        match init.quaternion {
            Some(q) => self.attitude.set_normalized(q),
            None => self.attitude = Attitude::default(),
        }
        self.bias = init.bias.unwrap_or_else(Vec3::zeros);
        self.p = self.p_initial;
        self.skipped = 0;
        Ok(())
    }

    fn update(&mut self, acc: &Vec3, gyro: &Vec3) -> Result<Quaternion<f64>, CoreError> {
        validate_sample(acc, gyro)?;

        self.predict(gyro);
        if !self.correct(acc) {
            self.skipped += 1;
            tracing::trace!(filter = self.name(), "accelerometer correction skipped");
        }
        self.attitude.normalize();

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
