//! Ingestion and output records
//!
//! Field names follow the recording device's row format (`esp32_ms_A`,
//! `ax_A` … `gz_B`) so rows can be (de)serialized as-is by any serde format.

use elbow_core::sample::{ImuSample, SamplePair};
use elbow_core::Vec3;
use serde::{Deserialize, Serialize};

use crate::session::AngleReading;

/// One row of a recorded session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImuReading {
    /// Host receive time, ISO 8601 (passed through untouched)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pc_time_iso: Option<String>,
    #[serde(rename = "esp32_ms_A")]
    pub esp32_ms_a: i64,
    #[serde(rename = "esp32_ms_B")]
    pub esp32_ms_b: i64,

    #[serde(rename = "ax_A")]
    pub ax_a: f64,
    #[serde(rename = "ay_A")]
    pub ay_a: f64,
    #[serde(rename = "az_A")]
    pub az_a: f64,
    #[serde(rename = "gx_A")]
    pub gx_a: f64,
    #[serde(rename = "gy_A")]
    pub gy_a: f64,
    #[serde(rename = "gz_A")]
    pub gz_a: f64,

    #[serde(rename = "ax_B")]
    pub ax_b: f64,
    #[serde(rename = "ay_B")]
    pub ay_b: f64,
    #[serde(rename = "az_B")]
    pub az_b: f64,
    #[serde(rename = "gx_B")]
    pub gx_b: f64,
    #[serde(rename = "gy_B")]
    pub gy_b: f64,
    #[serde(rename = "gz_B")]
    pub gz_b: f64,
}

impl ImuReading {
    /// Row for a sample pair, without a host timestamp
    pub fn from_pair(pair: &SamplePair) -> Self {
        Self {
            pc_time_iso: None,
            esp32_ms_a: pair.timestamp_ms_a,
            esp32_ms_b: pair.timestamp_ms_b,
            ax_a: pair.a.acc.x,
            ay_a: pair.a.acc.y,
            az_a: pair.a.acc.z,
            gx_a: pair.a.gyro.x,
            gy_a: pair.a.gyro.y,
            gz_a: pair.a.gyro.z,
            ax_b: pair.b.acc.x,
            ay_b: pair.b.acc.y,
            az_b: pair.b.acc.z,
            gx_b: pair.b.gyro.x,
            gy_b: pair.b.gyro.y,
            gz_b: pair.b.gyro.z,
        }
    }

    pub fn to_pair(&self) -> SamplePair {
        SamplePair {
            timestamp_ms_a: self.esp32_ms_a,
            timestamp_ms_b: self.esp32_ms_b,
            a: ImuSample::new(
                Vec3::new(self.ax_a, self.ay_a, self.az_a),
                Vec3::new(self.gx_a, self.gy_a, self.gz_a),
            ),
            b: ImuSample::new(
                Vec3::new(self.ax_b, self.ay_b, self.az_b),
                Vec3::new(self.gx_b, self.gy_b, self.gz_b),
            ),
        }
    }
}

impl From<&ImuReading> for SamplePair {
    fn from(reading: &ImuReading) -> Self {
        reading.to_pair()
    }
}

/// Output row: the bias-corrected reading augmented with the joint angles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AngleRow {
    #[serde(flatten)]
    pub reading: ImuReading,
    pub flexion_deg: f64,
    pub pronation_deg: f64,
}

impl AngleRow {
    pub fn new(reading: ImuReading, angles: AngleReading) -> Self {
        Self {
            reading,
            flexion_deg: angles.flexion_deg,
            pronation_deg: angles.pronation_deg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading() -> ImuReading {
        ImuReading {
            pc_time_iso: Some("2025-03-01T10:00:00.000".to_string()),
            esp32_ms_a: 1000,
            esp32_ms_b: 1002,
            ax_a: 0.1,
            ay_a: 0.2,
            az_a: 9.7,
            gx_a: 0.01,
            gy_a: 0.02,
            gz_a: 0.03,
            ax_b: -0.1,
            ay_b: -0.2,
            az_b: 9.8,
            gx_b: -0.01,
            gy_b: -0.02,
            gz_b: -0.03,
        }
    }

    #[test]
    fn test_reading_to_pair() {
        let pair = reading().to_pair();

        assert_eq!(pair.timestamp_ms_a, 1000);
        assert_eq!(pair.timestamp_ms_b, 1002);
        assert_eq!(pair.a.acc, Vec3::new(0.1, 0.2, 9.7));
        assert_eq!(pair.b.gyro, Vec3::new(-0.01, -0.02, -0.03));
    }

    #[test]
    fn test_pair_keeps_every_channel() {
        let original = reading();
        let mut restored = ImuReading::from_pair(&SamplePair::from(&original));
        restored.pc_time_iso = original.pc_time_iso.clone();

        assert_eq!(restored, original);
    }

    #[test]
    fn test_device_field_names() {
        let text = toml::to_string(&reading()).unwrap();

        assert!(text.contains("esp32_ms_A = 1000"));
        assert!(text.contains("gz_B = -0.03"));

        let parsed: ImuReading = toml::from_str(&text).unwrap();
        assert_eq!(parsed, reading());
    }
}
