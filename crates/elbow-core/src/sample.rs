//! IMU sample types

use serde::{Deserialize, Serialize};

use crate::{Vec3, GRAVITY};

/// One accelerometer/gyroscope reading from a single sensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImuSample {
    /// Specific force [m/s²]
    pub acc: Vec3,
    /// Angular velocity [rad/s]
    pub gyro: Vec3,
}

impl ImuSample {
    pub fn new(acc: Vec3, gyro: Vec3) -> Self {
        Self { acc, gyro }
    }

    /// Level sensor at rest
    pub fn at_rest() -> Self {
        Self::new(Vec3::new(0.0, 0.0, GRAVITY), Vec3::zeros())
    }
}

/// Sensor placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sensor {
    /// Sensor A, forearm
    A,
    /// Sensor B, upper arm
    B,
}

/// Co-indexed readings of both sensors at one logical instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplePair {
    /// Sensor A acquisition time [ms]
    pub timestamp_ms_a: i64,
    /// Sensor B acquisition time [ms]
    pub timestamp_ms_b: i64,
    pub a: ImuSample,
    pub b: ImuSample,
}

impl SamplePair {
    pub fn new(timestamp_ms: i64, a: ImuSample, b: ImuSample) -> Self {
        Self {
            timestamp_ms_a: timestamp_ms,
            timestamp_ms_b: timestamp_ms,
            a,
            b,
        }
    }

    pub fn sensor(&self, sensor: Sensor) -> &ImuSample {
        match sensor {
            Sensor::A => &self.a,
            Sensor::B => &self.b,
        }
    }

    pub fn sensor_mut(&mut self, sensor: Sensor) -> &mut ImuSample {
        match sensor {
            Sensor::A => &mut self.a,
            Sensor::B => &mut self.b,
        }
    }
}
