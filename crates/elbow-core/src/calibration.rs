//! Gyroscope zero-rate bias calibration
//!
//! The first `window` samples of a session are assumed stationary. The
//! per-axis gyro mean over that window is each sensor's bias, which is then
//! subtracted from every sample of that sensor for the whole session.
//! Non-finite readings are left out of the mean so they stay attributable to
//! their own sample when a filter rejects them.

use serde::{Deserialize, Serialize};

use crate::sample::{SamplePair, Sensor};
use crate::Vec3;

/// Stationary window used when the configured one is not a positive count
pub const DEFAULT_CALIBRATION_WINDOW: usize = 200;

/// Turn a configured window into a usable sample count
///
/// Non-positive values fall back to [`DEFAULT_CALIBRATION_WINDOW`].
pub fn resolve_window(requested: i64) -> usize {
    match usize::try_from(requested) {
        Ok(window) if window > 0 => window,
        _ => {
            tracing::warn!(
                requested,
                default = DEFAULT_CALIBRATION_WINDOW,
                "Invalid calibration window, using default"
            );
            DEFAULT_CALIBRATION_WINDOW
        }
    }
}

/// Constant per-axis gyroscope offset of one sensor [rad/s]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GyroBias(Vec3);

impl GyroBias {
    /// Mean of the finite gyro readings (zero when there are none)
    pub fn from_mean<'a, I>(readings: I) -> Self
    where
        I: IntoIterator<Item = &'a Vec3>,
    {
        let (sum, count) = readings
            .into_iter()
            .filter(|g| g.iter().all(|c| c.is_finite()))
            .fold((Vec3::zeros(), 0usize), |(sum, n), g| (sum + g, n + 1));

        if count == 0 {
            Self::default()
        } else {
            Self(sum / count as f64)
        }
    }

    pub fn vector(&self) -> Vec3 {
        self.0
    }

    /// Bias-corrected reading
    pub fn remove_from(&self, gyro: &Vec3) -> Vec3 {
        gyro - self.0
    }
}

/// Biases of both sensors estimated from one stationary window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GyroCalibration {
    bias_a: GyroBias,
    bias_b: GyroBias,
    /// Number of samples the means were taken over
    samples_used: usize,
}

impl GyroCalibration {
    /// Estimate both biases from the first `window` pairs of `samples`
    pub fn estimate(samples: &[SamplePair], window: usize) -> Self {
        let stationary = &samples[..window.min(samples.len())];

        let calibration = Self {
            bias_a: GyroBias::from_mean(stationary.iter().map(|p| &p.a.gyro)),
            bias_b: GyroBias::from_mean(stationary.iter().map(|p| &p.b.gyro)),
            samples_used: stationary.len(),
        };

        let (a, b) = (calibration.bias_a.vector(), calibration.bias_b.vector());
        tracing::debug!(
            samples = calibration.samples_used,
            bias_a_x = a.x,
            bias_a_y = a.y,
            bias_a_z = a.z,
            bias_b_x = b.x,
            bias_b_y = b.y,
            bias_b_z = b.z,
            "Gyroscope calibration complete"
        );

        calibration
    }

    pub fn bias(&self, sensor: Sensor) -> GyroBias {
        match sensor {
            Sensor::A => self.bias_a,
            Sensor::B => self.bias_b,
        }
    }

    pub fn samples_used(&self) -> usize {
        self.samples_used
    }

    /// Subtract both biases from one pair in place
    pub fn apply(&self, pair: &mut SamplePair) {
        for sensor in [Sensor::A, Sensor::B] {
            let sample = pair.sensor_mut(sensor);
            sample.gyro = self.bias(sensor).remove_from(&sample.gyro);
        }
    }
}

/// Calibrate a whole in-memory session in place
pub fn calibrate_gyro(samples: &mut [SamplePair], window: i64) -> GyroCalibration {
    let calibration = GyroCalibration::estimate(samples, resolve_window(window));
    for pair in samples.iter_mut() {
        calibration.apply(pair);
    }
    calibration
}

/// Single-pass calibration over a sample stream
///
/// Only the stationary window is buffered; the rest of the session is
/// corrected as it is pulled.
pub struct CalibratedStream<I> {
    calibration: GyroCalibration,
    head: std::vec::IntoIter<SamplePair>,
    tail: I,
}

impl<I> CalibratedStream<I>
where
    I: Iterator<Item = SamplePair>,
{
    /// Consume the stationary window of `samples` and estimate the biases
    pub fn new<S>(samples: S, window: i64) -> Self
    where
        S: IntoIterator<IntoIter = I>,
    {
        let window = resolve_window(window);
        let mut tail = samples.into_iter();
        let head: Vec<SamplePair> = tail.by_ref().take(window).collect();
        let calibration = GyroCalibration::estimate(&head, window);

        Self {
            calibration,
            head: head.into_iter(),
            tail,
        }
    }

    pub fn calibration(&self) -> &GyroCalibration {
        &self.calibration
    }
}

impl<I> Iterator for CalibratedStream<I>
where
    I: Iterator<Item = SamplePair>,
{
    type Item = SamplePair;

    fn next(&mut self) -> Option<SamplePair> {
        let mut pair = self.head.next().or_else(|| self.tail.next())?;
        self.calibration.apply(&mut pair);
        Some(pair)
    }
}
