//! Synthetic sessions with known ground truth
//!
//! The upper arm (sensor B) rests level while the forearm (sensor A) moves
//! through flexion and pronation about the configured true joint axes. Every
//! session starts with a stationary preamble for gyro calibration. The
//! accelerometer model is gravity only; linear acceleration of the forearm is
//! not simulated.

use elbow_core::error::sample_period;
use elbow_core::estimation::{JointAngles, MountingAxes};
use elbow_core::math::{angular_velocity_from_quaternions, quaternion_from_axis_angle};
use elbow_core::sample::{ImuSample, SamplePair};
use elbow_core::{CoreError, Vec3, GRAVITY};
use nalgebra::UnitQuaternion;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::SessionError;

/// Sensor imperfections applied to both sensors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImuNoise {
    /// Accelerometer white noise [m/s²]
    pub acc_std: f64,
    /// Gyroscope white noise [rad/s]
    pub gyro_std: f64,
    /// Constant gyroscope offset of sensor A [rad/s]
    pub gyro_bias_a: Vec3,
    /// Constant gyroscope offset of sensor B [rad/s]
    pub gyro_bias_b: Vec3,
}

impl Default for ImuNoise {
    fn default() -> Self {
        Self {
            acc_std: 0.05,
            gyro_std: 0.005,
            gyro_bias_a: Vec3::new(0.01, -0.02, 0.005),
            gyro_bias_b: Vec3::new(-0.015, 0.01, 0.02),
        }
    }
}

impl ImuNoise {
    /// Perfect sensors
    pub fn none() -> Self {
        Self {
            acc_std: 0.0,
            gyro_std: 0.0,
            gyro_bias_a: Vec3::zeros(),
            gyro_bias_b: Vec3::zeros(),
        }
    }
}

/// Sinusoidal elbow exercise
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElbowMotion {
    /// Peak flexion, reached from full extension (0°) [deg]
    pub flexion_amplitude_deg: f64,
    pub flexion_frequency_hz: f64,
    /// Pronation/supination swing around neutral [deg]
    pub pronation_amplitude_deg: f64,
    pub pronation_frequency_hz: f64,
}

impl Default for ElbowMotion {
    fn default() -> Self {
        Self {
            flexion_amplitude_deg: 90.0,
            flexion_frequency_hz: 0.25,
            pronation_amplitude_deg: 40.0,
            pronation_frequency_hz: 0.4,
        }
    }
}

impl ElbowMotion {
    /// No motion at all
    pub fn still() -> Self {
        Self {
            flexion_amplitude_deg: 0.0,
            flexion_frequency_hz: 0.0,
            pronation_amplitude_deg: 0.0,
            pronation_frequency_hz: 0.0,
        }
    }

    /// Joint angles `t` seconds after the motion starts (zero before)
    pub fn angles_at(&self, t: f64) -> JointAngles {
        if t <= 0.0 {
            return JointAngles::default();
        }
        let flexion = 0.5
            * self.flexion_amplitude_deg
            * (1.0 - (2.0 * PI * self.flexion_frequency_hz * t).cos());
        let pronation =
            self.pronation_amplitude_deg * (2.0 * PI * self.pronation_frequency_hz * t).sin();
        JointAngles::new(flexion, pronation)
    }
}

/// Synthetic session parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub sample_rate_hz: f64,
    /// Leading samples at rest
    pub stationary_samples: usize,
    /// Samples of motion after the preamble
    pub motion_samples: usize,
    pub motion: ElbowMotion,
    /// True joint axes of the simulated arm
    pub joint_axes: MountingAxes,
    pub noise: ImuNoise,
    pub seed: u64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: elbow_core::DEFAULT_SAMPLE_RATE_HZ,
            stationary_samples: 200,
            motion_samples: 1000,
            motion: ElbowMotion::default(),
            joint_axes: MountingAxes::default(),
            noise: ImuNoise::default(),
            seed: 42,
        }
    }
}

/// Generated samples and the true joint angles of each
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSession {
    pub samples: Vec<SamplePair>,
    pub truth: Vec<JointAngles>,
}

impl SyntheticSession {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

fn normal(name: &'static str, std_dev: f64) -> Result<Normal<f64>, CoreError> {
    Normal::new(0.0, std_dev).map_err(|_| CoreError::InvalidParameter {
        name,
        value: std_dev,
    })
}

fn gaussian_vec3(dist: &Normal<f64>, rng: &mut StdRng) -> Vec3 {
    Vec3::new(dist.sample(rng), dist.sample(rng), dist.sample(rng))
}

/// Noisy sensor readings of one segment over one sample interval
struct SegmentSensor {
    bias: Vec3,
}

impl SegmentSensor {
    fn measure(
        &self,
        previous: &UnitQuaternion<f64>,
        current: &UnitQuaternion<f64>,
        dt: f64,
        noise: (&Normal<f64>, &Normal<f64>),
        rng: &mut StdRng,
    ) -> ImuSample {
        let (acc_noise, gyro_noise) = noise;

        let acc = current.inverse() * Vec3::new(0.0, 0.0, GRAVITY) + gaussian_vec3(acc_noise, rng);
        let gyro = angular_velocity_from_quaternions(previous, current, dt)
            + self.bias
            + gaussian_vec3(gyro_noise, rng);
        ImuSample::new(acc, gyro)
    }
}

/// Generate a session from its parameters
///
/// The same configuration (including the seed) always yields the same samples.
pub fn generate(config: &ScenarioConfig) -> Result<SyntheticSession, SessionError> {
    let dt = sample_period(config.sample_rate_hz)?;
    let acc_noise = normal("acc_std", config.noise.acc_std)?;
    let gyro_noise = normal("gyro_std", config.noise.gyro_std)?;
    let mut rng = StdRng::seed_from_u64(config.seed);

    let axes = config.joint_axes.normalized();
    let sensor_a = SegmentSensor {
        bias: config.noise.gyro_bias_a,
    };
    let sensor_b = SegmentSensor {
        bias: config.noise.gyro_bias_b,
    };

    // Forearm orientation for given joint angles, upper arm at identity
    let forearm = |angles: &JointAngles| {
        let rel = quaternion_from_axis_angle(&axes.pronation, angles.pronation_deg.to_radians())
            * quaternion_from_axis_angle(&axes.flexion, angles.flexion_deg.to_radians());
        rel.inverse()
    };
    let upper = UnitQuaternion::identity();

    let total = config.stationary_samples + config.motion_samples;
    let mut samples = Vec::with_capacity(total);
    let mut truth = Vec::with_capacity(total);
    let mut previous_a = UnitQuaternion::identity();

    for k in 0..total {
        let t = (k as f64 - config.stationary_samples as f64 + 1.0) * dt;
        let angles = config.motion.angles_at(t);
        let q_a = forearm(&angles);

        let a = sensor_a.measure(&previous_a, &q_a, dt, (&acc_noise, &gyro_noise), &mut rng);
        let b = sensor_b.measure(&upper, &upper, dt, (&acc_noise, &gyro_noise), &mut rng);
        let timestamp_ms = (k as f64 * dt * 1000.0).round() as i64;

        samples.push(SamplePair::new(timestamp_ms, a, b));
        truth.push(angles);
        previous_a = q_a;
    }

    tracing::debug!(
        samples = total,
        seed = config.seed,
        "Synthetic session generated"
    );

    Ok(SyntheticSession { samples, truth })
}

/// Both sensors at rest for `len` samples
pub fn stationary(len: usize, noise: ImuNoise, seed: u64) -> Result<SyntheticSession, SessionError> {
    generate(&ScenarioConfig {
        stationary_samples: len,
        motion_samples: 0,
        motion: ElbowMotion::still(),
        noise,
        seed,
        ..Default::default()
    })
}
