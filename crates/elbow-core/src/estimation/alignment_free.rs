//! Joint angles without known sensor mounting
//!
//! For a two-axis elbow the relative angular velocity of the segments,
//! ω_rel = R_A ω_A − R_B ω_B, always lies in the plane spanned by the
//! world-frame flexion axis R_B j_fe and pronation axis R_A j_ps. Both axes are
//! identified by minimizing the out-of-plane component of ω_rel over a FIFO
//! window of recent moving samples:
//!
//! ```text
//! e_i = ω_rel,i · n̂_i,   n_i = (R_B,i j_fe) × (R_A,i j_ps)
//! ```
//!
//! plus a weak prior that keeps the two axes from collapsing onto each other.
//! Axes are parameterized in spherical coordinates and refined with damped
//! Gauss-Newton (Levenberg-Marquardt) on a central-difference Jacobian.

use std::collections::VecDeque;

use nalgebra::{Matrix4, Vector4};
use serde::{Deserialize, Serialize};

use super::{decompose, relative_rotation, JointAngleEstimator, JointAngles, MountingAxes};
use crate::error::{ensure_parameter, sample_period};
use crate::math::{spherical_from_vector, unit_from_spherical};
use crate::{CoreError, Mat3, Vec3};

/// Parameter step of the numerical Jacobian [rad]
const JACOBIAN_STEP: f64 = 1e-6;

/// Axis pairs closer to parallel than this constrain nothing
const MIN_PLANE_NORM: f64 = 1e-6;

/// Largest FIFO window accepted, in samples
pub const MAX_WINDOW_SAMPLES: usize = 1_000_000;

/// Tuning of the functional axis identification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentFreeParams {
    /// Span of the FIFO of moving samples [s]
    pub window_s: f64,
    /// Motion required before the first fit [s]
    pub min_motion_s: f64,
    /// Accepted motion between refits [s]
    pub refit_interval_s: f64,
    /// Levenberg-Marquardt iterations per refit
    pub iterations: usize,
    /// Relative angular rate below which a sample carries no axis information [rad/s]
    pub min_angular_rate: f64,
    /// Weight of the perpendicularity prior
    pub regularization: f64,
    /// Initial Levenberg-Marquardt damping
    pub damping: f64,
}

impl Default for AlignmentFreeParams {
    fn default() -> Self {
        Self {
            window_s: 4.0,
            min_motion_s: 1.0,
            refit_interval_s: 0.5,
            iterations: 5,
            min_angular_rate: 0.2,
            regularization: 0.1,
            damping: 1e-3,
        }
    }
}

impl AlignmentFreeParams {
    pub fn validate(&self) -> Result<(), CoreError> {
        ensure_parameter("window_s", self.window_s)?;
        ensure_parameter("min_motion_s", self.min_motion_s)?;
        ensure_parameter("refit_interval_s", self.refit_interval_s)?;
        ensure_parameter("min_angular_rate", self.min_angular_rate)?;
        ensure_parameter("regularization", self.regularization)?;
        ensure_parameter("damping", self.damping)?;
        if self.window_s == 0.0 {
            return Err(CoreError::InvalidParameter {
                name: "window_s",
                value: self.window_s,
            });
        }
        Ok(())
    }
}

/// Number of samples covering `seconds` (at least one)
fn sample_count(seconds: f64, sample_rate_hz: f64) -> usize {
    (seconds * sample_rate_hz).round().max(1.0) as usize
}

/// One moving sample kept for the fit
#[derive(Debug, Clone, Copy)]
struct MotionSample {
    r_a: Mat3,
    r_b: Mat3,
    /// World-frame relative angular velocity [rad/s]
    omega_rel: Vec3,
}

impl MotionSample {
    /// Out-of-plane relative rate and world-frame axis alignment
    fn evaluate(&self, j_fe: &Vec3, j_ps: &Vec3) -> (f64, f64) {
        let fe_world = self.r_b * j_fe;
        let ps_world = self.r_a * j_ps;
        let normal = fe_world.cross(&ps_world);
        let norm = normal.norm();

        let residual = if norm < MIN_PLANE_NORM {
            0.0
        } else {
            self.omega_rel.dot(&normal) / norm
        };
        (residual, fe_world.dot(&ps_world))
    }
}

/// Parameter vector [θ_fe, φ_fe, θ_ps, φ_ps]
type AxisParams = Vector4<f64>;

fn axes_from_params(x: &AxisParams) -> (Vec3, Vec3) {
    (unit_from_spherical(x[0], x[1]), unit_from_spherical(x[2], x[3]))
}

fn params_from_axes(axes: &MountingAxes) -> AxisParams {
    let (theta_fe, phi_fe) = spherical_from_vector(&axes.flexion);
    let (theta_ps, phi_ps) = spherical_from_vector(&axes.pronation);
    AxisParams::new(theta_fe, phi_fe, theta_ps, phi_ps)
}

/// Flip `v` into the half-space of `reference`
fn align_sign(v: Vec3, reference: &Vec3) -> Vec3 {
    if v.dot(reference) < 0.0 {
        -v
    } else {
        v
    }
}

/// Estimator that identifies its joint axes from the motion
///
/// Until enough motion has been observed the configured mounting axes are
/// used, which makes the output identical to [`super::SimpleEstimator`].
#[derive(Debug, Clone)]
pub struct AlignmentFreeEstimator {
    params: AlignmentFreeParams,
    /// Configured axes, also the sign reference for every fit
    nominal: MountingAxes,
    axes: MountingAxes,
    window: VecDeque<MotionSample>,
    capacity: usize,
    min_samples: usize,
    refit_interval: usize,
    since_fit: usize,
    fits: usize,
}

impl AlignmentFreeEstimator {
    /// Create an estimator starting from the given mounting axes
    ///
    /// # Arguments
    /// * `sample_rate_hz` - Rate of the sample stream [Hz]
    /// * `axes` - Nominal mounting axes, used until the first fit
    /// * `params` - Identification tuning
    pub fn new(
        sample_rate_hz: f64,
        axes: MountingAxes,
        params: AlignmentFreeParams,
    ) -> Result<Self, CoreError> {
        sample_period(sample_rate_hz)?;
        params.validate()?;

        if params.window_s * sample_rate_hz > MAX_WINDOW_SAMPLES as f64 {
            return Err(CoreError::InvalidParameter {
                name: "window_s",
                value: params.window_s,
            });
        }

        let capacity = sample_count(params.window_s, sample_rate_hz);
        let min_samples = sample_count(params.min_motion_s, sample_rate_hz).min(capacity);
        let nominal = axes.normalized();

        Ok(Self {
            params,
            nominal,
            axes: nominal,
            window: VecDeque::new(),
            capacity,
            min_samples,
            refit_interval: sample_count(params.refit_interval_s, sample_rate_hz),
            since_fit: 0,
            fits: 0,
        })
    }

    /// Number of moving samples currently buffered
    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Number of axis fits performed so far
    pub fn fits(&self) -> usize {
        self.fits
    }

    /// Whether the axes have been identified from motion at least once
    pub fn is_identified(&self) -> bool {
        self.fits > 0
    }

    /// Buffer a sample if it is finite and moving, refitting when due
    fn observe(&mut self, r_a: &Mat3, gyro_a: &Vec3, r_b: &Mat3, gyro_b: &Vec3) {
        let omega_rel = r_a * gyro_a - r_b * gyro_b;
        let finite = r_a
            .iter()
            .chain(r_b.iter())
            .chain(omega_rel.iter())
            .all(|v| v.is_finite());
        if !finite || omega_rel.norm() < self.params.min_angular_rate {
            return;
        }

        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(MotionSample {
            r_a: *r_a,
            r_b: *r_b,
            omega_rel,
        });
        self.since_fit += 1;

        if self.window.len() >= self.min_samples && self.since_fit >= self.refit_interval {
            self.since_fit = 0;
            self.refit();
        }
    }

    fn prior_weight(&self) -> f64 {
        self.params.regularization * (self.window.len() as f64).sqrt()
    }

    /// Sum of squared residuals at `x`
    fn cost(&self, x: &AxisParams) -> f64 {
        let (j_fe, j_ps) = axes_from_params(x);
        let (sum_sq, dot_sum) = self.window.iter().fold((0.0, 0.0), |(s, d), m| {
            let (r, dot) = m.evaluate(&j_fe, &j_ps);
            (s + r * r, d + dot)
        });
        let prior = self.prior_weight() * dot_sum / self.window.len() as f64;
        sum_sq + prior * prior
    }

    /// Gauss-Newton normal equations JᵀJ and Jᵀr at `x`
    fn normal_equations(&self, x: &AxisParams) -> (Matrix4<f64>, Vector4<f64>) {
        let (j_fe, j_ps) = axes_from_params(x);
        let shifted: [((Vec3, Vec3), (Vec3, Vec3)); 4] = std::array::from_fn(|k| {
            let mut step = AxisParams::zeros();
            step[k] = JACOBIAN_STEP;
            (axes_from_params(&(x + step)), axes_from_params(&(x - step)))
        });

        let mut jtj = Matrix4::zeros();
        let mut jtr = Vector4::zeros();
        let mut dot_sum = 0.0;
        let mut dot_grad = Vector4::zeros();

        for m in &self.window {
            let (r, dot) = m.evaluate(&j_fe, &j_ps);
            let mut g = Vector4::zeros();
            for (k, (plus, minus)) in shifted.iter().enumerate() {
                let (r_plus, dot_plus) = m.evaluate(&plus.0, &plus.1);
                let (r_minus, dot_minus) = m.evaluate(&minus.0, &minus.1);
                g[k] = (r_plus - r_minus) / (2.0 * JACOBIAN_STEP);
                dot_grad[k] += (dot_plus - dot_minus) / (2.0 * JACOBIAN_STEP);
            }
            jtj += g * g.transpose();
            jtr += g * r;
            dot_sum += dot;
        }

        let scale = self.prior_weight() / self.window.len() as f64;
        let prior = scale * dot_sum;
        let prior_grad = dot_grad * scale;
        jtj += prior_grad * prior_grad.transpose();
        jtr += prior_grad * prior;

        (jtj, jtr)
    }

    /// Refine the axes on the current window
    fn refit(&mut self) {
        let mut x = params_from_axes(&self.axes);
        let initial_cost = self.cost(&x);
        let mut cost = initial_cost;
        let mut damping = self.params.damping;

        for _ in 0..self.params.iterations {
            let (jtj, jtr) = self.normal_equations(&x);
            let chol = match (jtj + Matrix4::identity() * damping).cholesky() {
                Some(chol) => chol,
                None => {
                    damping *= 10.0;
                    continue;
                }
            };

            let candidate = x - chol.solve(&jtr);
            let candidate_cost = self.cost(&candidate);
            if candidate_cost.is_finite() && candidate_cost < cost {
                x = candidate;
                cost = candidate_cost;
                damping *= 0.3;
            } else {
                damping *= 10.0;
            }
        }

        let (j_fe, j_ps) = axes_from_params(&x);
        self.axes = MountingAxes {
            flexion: align_sign(j_fe, &self.nominal.flexion),
            pronation: align_sign(j_ps, &self.nominal.pronation),
        };
        self.fits += 1;

        tracing::debug!(
            fit = self.fits,
            samples = self.window.len(),
            initial_cost,
            cost,
            fe_x = self.axes.flexion.x,
            fe_y = self.axes.flexion.y,
            fe_z = self.axes.flexion.z,
            ps_x = self.axes.pronation.x,
            ps_y = self.axes.pronation.y,
            ps_z = self.axes.pronation.z,
            "Joint axes refitted"
        );
    }
}

impl JointAngleEstimator for AlignmentFreeEstimator {
    fn name(&self) -> &'static str {
        "alignment-free"
    }

    fn update(&mut self, r_a: &Mat3, gyro_a: &Vec3, r_b: &Mat3, gyro_b: &Vec3) -> JointAngles {
        self.observe(r_a, gyro_a, r_b, gyro_b);
        decompose(&relative_rotation(r_a, r_b), &self.axes)
    }

    fn axes(&self) -> MountingAxes {
        self.axes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::SimpleEstimator;
    use crate::math::{angular_velocity_from_quaternions, quaternion_from_axis_angle};
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;
    use std::f64::consts::PI;

    const RATE: f64 = 100.0;

    fn true_flexion_axis() -> Vec3 {
        Vec3::new(0.2, 1.0, 0.15).normalize()
    }

    fn true_pronation_axis() -> Vec3 {
        Vec3::new(1.0, -0.2, 0.1).normalize()
    }

    fn joint_angles(t: f64) -> (f64, f64) {
        let fe = 60.0 + 40.0 * (PI * t).sin();
        let ps = 30.0 * (0.6 * PI * t + 0.4).sin();
        (fe, ps)
    }

    /// Forearm and upper-arm orientations of a misaligned elbow at time `t`
    fn segment_poses(t: f64) -> (UnitQuaternion<f64>, UnitQuaternion<f64>) {
        let upper = quaternion_from_axis_angle(&Vec3::z(), 0.4 * (0.7 * t).sin())
            * quaternion_from_axis_angle(&Vec3::x(), 0.25 * (0.9 * t).sin());
        let (fe, ps) = joint_angles(t);
        let rel = quaternion_from_axis_angle(&true_pronation_axis(), ps.to_radians())
            * quaternion_from_axis_angle(&true_flexion_axis(), fe.to_radians());
        (upper * rel.inverse(), upper)
    }

    /// (R_A, ω_A, R_B, ω_B) at sample `k`, body rates by central difference
    fn sample(k: usize) -> (Mat3, Vec3, Mat3, Vec3) {
        let dt = 1.0 / RATE;
        let t = k as f64 * dt;
        let (a_prev, b_prev) = segment_poses(t - 0.5 * dt);
        let (a_next, b_next) = segment_poses(t + 0.5 * dt);
        let (a, b) = segment_poses(t);
        (
            *a.to_rotation_matrix().matrix(),
            angular_velocity_from_quaternions(&a_prev, &a_next, dt),
            *b.to_rotation_matrix().matrix(),
            angular_velocity_from_quaternions(&b_prev, &b_next, dt),
        )
    }

    fn angle_between_deg(u: &Vec3, v: &Vec3) -> f64 {
        u.normalize().dot(&v.normalize()).clamp(-1.0, 1.0).acos().to_degrees()
    }

    #[test]
    fn test_stationary_matches_simple() {
        let params = AlignmentFreeParams::default();
        let mut estimator = AlignmentFreeEstimator::new(RATE, MountingAxes::default(), params).unwrap();
        let mut simple = SimpleEstimator::default();

        let r_a = *quaternion_from_axis_angle(&Vec3::x(), 0.3).to_rotation_matrix().matrix();
        let r_b = *quaternion_from_axis_angle(&Vec3::y(), 1.1).to_rotation_matrix().matrix();

        for _ in 0..500 {
            let free = estimator.update(&r_a, &Vec3::zeros(), &r_b, &Vec3::zeros());
            let fixed = simple.update(&r_a, &Vec3::zeros(), &r_b, &Vec3::zeros());
            assert_eq!(free, fixed);
        }
        assert_eq!(estimator.window_len(), 0);
        assert!(!estimator.is_identified());
    }

    #[test]
    fn test_recovers_misaligned_axes() {
        let mut estimator =
            AlignmentFreeEstimator::new(RATE, MountingAxes::default(), AlignmentFreeParams::default())
                .unwrap();

        let steps = 2000;
        let mut last = JointAngles::default();
        for k in 0..steps {
            let (r_a, w_a, r_b, w_b) = sample(k);
            last = estimator.update(&r_a, &w_a, &r_b, &w_b);
        }

        assert!(estimator.is_identified());
        let axes = estimator.axes();
        assert!(angle_between_deg(&axes.flexion, &true_flexion_axis()) < 2.0);
        assert!(angle_between_deg(&axes.pronation, &true_pronation_axis()) < 2.0);

        let (fe, ps) = joint_angles((steps - 1) as f64 / RATE);
        assert!((last.flexion_deg - fe).abs() < 3.0);
        assert!((last.pronation_deg - ps).abs() < 3.0);
    }

    #[test]
    fn test_deterministic() {
        let params = AlignmentFreeParams::default();
        let mut first = AlignmentFreeEstimator::new(RATE, MountingAxes::default(), params).unwrap();
        let mut second = AlignmentFreeEstimator::new(RATE, MountingAxes::default(), params).unwrap();

        for k in 0..400 {
            let (r_a, w_a, r_b, w_b) = sample(k);
            let x = first.update(&r_a, &w_a, &r_b, &w_b);
            let y = second.update(&r_a, &w_a, &r_b, &w_b);
            assert_eq!(x.flexion_deg.to_bits(), y.flexion_deg.to_bits());
            assert_eq!(x.pronation_deg.to_bits(), y.pronation_deg.to_bits());
        }
        assert_eq!(first.fits(), second.fits());
    }

    #[test]
    fn test_non_finite_sample_not_buffered() {
        let mut estimator =
            AlignmentFreeEstimator::new(RATE, MountingAxes::default(), AlignmentFreeParams::default())
                .unwrap();

        let bad = Mat3::from_element(f64::NAN);
        let angles = estimator.update(&bad, &Vec3::new(1.0, 0.0, 0.0), &Mat3::identity(), &Vec3::zeros());

        assert!(!angles.is_finite());
        assert_eq!(estimator.window_len(), 0);
    }

    #[test]
    fn test_window_is_bounded() {
        let params = AlignmentFreeParams {
            window_s: 0.5,
            min_motion_s: 0.2,
            refit_interval_s: 0.1,
            ..Default::default()
        };
        let mut estimator = AlignmentFreeEstimator::new(RATE, MountingAxes::default(), params).unwrap();

        for k in 0..300 {
            let (r_a, w_a, r_b, w_b) = sample(k);
            estimator.update(&r_a, &w_a, &r_b, &w_b);
        }

        assert!(estimator.window_len() <= 50);
        assert!(estimator.fits() > 0);
        assert_relative_eq!(estimator.axes().flexion.norm(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(estimator.axes().pronation.norm(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let negative = AlignmentFreeParams {
            min_angular_rate: -1.0,
            ..Default::default()
        };
        assert!(AlignmentFreeEstimator::new(RATE, MountingAxes::default(), negative).is_err());

        let empty = AlignmentFreeParams {
            window_s: 0.0,
            ..Default::default()
        };
        assert!(AlignmentFreeEstimator::new(RATE, MountingAxes::default(), empty).is_err());

        assert!(AlignmentFreeEstimator::new(
            f64::NAN,
            MountingAxes::default(),
            AlignmentFreeParams::default()
        )
        .is_err());
    }

    #[test]
    fn test_window_length_is_capped() {
        let at_limit = AlignmentFreeParams {
            window_s: MAX_WINDOW_SAMPLES as f64 / RATE,
            ..Default::default()
        };
        let estimator = AlignmentFreeEstimator::new(RATE, MountingAxes::default(), at_limit).unwrap();
        assert_eq!(estimator.window_len(), 0);

        for window_s in [1e7, 1e20] {
            let params = AlignmentFreeParams {
                window_s,
                ..Default::default()
            };
            let err = AlignmentFreeEstimator::new(RATE, MountingAxes::default(), params).unwrap_err();
            assert_eq!(
                err,
                CoreError::InvalidParameter {
                    name: "window_s",
                    value: window_s
                }
            );
        }
    }
}
