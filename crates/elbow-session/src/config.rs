//! Session configuration
//!
//! Every field has a default, so a TOML file only needs to name what it
//! changes:
//!
//! ```toml
//! sample_rate_hz = 100.0
//! calibration_window = 200
//! filter = "ekf"
//! estimator = "simple"
//!
//! [filters.ekf]
//! acc_noise = 0.05
//!
//! [mounting]
//! flexion = [0.0, 1.0, 0.0]
//! ```

use std::path::Path;

use elbow_core::estimation::{AlignmentFreeParams, EstimatorKind, MountingAxes};
use elbow_core::filter::{FilterKind, FilterParams};
use elbow_core::sample::Sensor;
use elbow_core::DEFAULT_SAMPLE_RATE_HZ;
use elbow_core::calibration::DEFAULT_CALIBRATION_WINDOW;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Main session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Rate of the recorded samples [Hz]
    pub sample_rate_hz: f64,
    /// Leading stationary samples used for gyro calibration
    /// (non-positive values use the default)
    pub calibration_window: i64,
    /// Filter variant for both sensors
    pub filter: String,
    /// Per-sensor overrides of `filter`
    pub filter_a: Option<String>,
    pub filter_b: Option<String>,
    /// Joint-angle estimator variant
    pub estimator: String,
    /// Filter tuning
    pub filters: FilterParams,
    /// Nominal mounting axes
    pub mounting: MountingAxes,
    /// Axis identification tuning of the alignment-free estimator
    pub alignment_free: AlignmentFreeParams,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            calibration_window: DEFAULT_CALIBRATION_WINDOW as i64,
            filter: FilterKind::default().name().to_string(),
            filter_a: None,
            filter_b: None,
            estimator: EstimatorKind::default().name().to_string(),
            filters: FilterParams::default(),
            mounting: MountingAxes::default(),
            alignment_free: AlignmentFreeParams::default(),
        }
    }
}

impl SessionConfig {
    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self, SessionError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SessionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(?path, "Loaded session config");
        Ok(config)
    }

    /// Filter variant for one sensor
    ///
    /// Unknown names fall back to the default variant with a warning.
    pub fn filter_kind(&self, sensor: Sensor) -> FilterKind {
        let name = match sensor {
            Sensor::A => self.filter_a.as_deref(),
            Sensor::B => self.filter_b.as_deref(),
        }
        .unwrap_or(&self.filter);

        FilterKind::from_name(name).unwrap_or_else(|| {
            let fallback = FilterKind::default();
            tracing::warn!(
                requested = name,
                sensor = ?sensor,
                fallback = fallback.name(),
                "Unknown filter, using default"
            );
            fallback
        })
    }

    /// Estimator variant
    ///
    /// Unknown names fall back to the default variant with a warning.
    pub fn estimator_kind(&self) -> EstimatorKind {
        EstimatorKind::from_name(&self.estimator).unwrap_or_else(|| {
            let fallback = EstimatorKind::default();
            tracing::warn!(
                requested = self.estimator.as_str(),
                fallback = fallback.name(),
                "Unknown estimator, using default"
            );
            fallback
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use elbow_core::Vec3;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();

        assert_eq!(config.sample_rate_hz, 100.0);
        assert_eq!(config.calibration_window, 200);
        assert_eq!(config.filter_kind(Sensor::A), FilterKind::ComplementaryV1);
        assert_eq!(config.filter_kind(Sensor::B), FilterKind::ComplementaryV1);
        assert_eq!(config.estimator_kind(), EstimatorKind::AlignmentFree);
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = SessionConfig::from_toml_str("").unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn test_parse_partial_document() {
        let config = SessionConfig::from_toml_str(
            r#"
            sample_rate_hz = 200.0
            calibration_window = 50
            filter = "ekf"
            filter_b = "mahony"
            estimator = "simple"

            [filters.madgwick]
            gain = 0.1

            [filters.ekf]
            acc_noise = 0.05

            [mounting]
            flexion = [0.0, 0.0, 1.0]
            "#,
        )
        .unwrap();

        assert_eq!(config.sample_rate_hz, 200.0);
        assert_eq!(config.calibration_window, 50);
        assert_eq!(config.filter_kind(Sensor::A), FilterKind::Ekf);
        assert_eq!(config.filter_kind(Sensor::B), FilterKind::ComplementaryV2);
        assert_eq!(config.estimator_kind(), EstimatorKind::Simple);
        assert_relative_eq!(config.filters.madgwick.gain, 0.1);
        assert_relative_eq!(config.filters.ekf.acc_noise, 0.05);
        // Untouched fields keep their defaults
        assert_relative_eq!(config.filters.ekf.gyro_noise, 0.02);
        assert_eq!(config.mounting.flexion, Vec3::z());
        assert_eq!(config.mounting.pronation, Vec3::x());
    }

    #[test]
    fn test_unknown_names_fall_back() {
        let config = SessionConfig {
            filter: "kalman-ish".to_string(),
            estimator: "magic".to_string(),
            ..Default::default()
        };

        assert_eq!(config.filter_kind(Sensor::A), FilterKind::ComplementaryV1);
        assert_eq!(config.estimator_kind(), EstimatorKind::AlignmentFree);
    }

    #[test]
    fn test_malformed_document_is_error() {
        let err = SessionConfig::from_toml_str("sample_rate_hz = \"fast\"").unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = SessionConfig::load("/nonexistent/elbow/session.toml").unwrap_err();
        assert!(matches!(err, SessionError::Io { .. }));
    }
}
