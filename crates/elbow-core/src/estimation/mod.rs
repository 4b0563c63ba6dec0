//! Elbow joint-angle estimation
//!
//! Estimators turn the orientations of the forearm sensor (A) and the
//! upper-arm sensor (B) into flexion/extension (FE) and
//! pronation/supination (PS) angles:
//! - [`SimpleEstimator`]: fixed, known mounting axes
//! - [`AlignmentFreeEstimator`]: joint axes identified from the motion itself
//!
//! Both decompose the relative rotation R_rel = R_Aᵀ R_B as
//! Rot(j_ps, PS) · Rot(j_fe, FE), with j_ps fixed in the forearm frame and
//! j_fe fixed in the upper-arm frame. Output angles are raw degrees; wrapping
//! is left to the caller.

pub mod decomposition;
pub mod simple;
pub mod alignment_free;

pub use decomposition::*;
pub use simple::*;
pub use alignment_free::*;

use serde::{Deserialize, Serialize};

use crate::{Mat3, Vec3};

/// Flexion/extension and pronation/supination angles [deg]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JointAngles {
    pub flexion_deg: f64,
    pub pronation_deg: f64,
}

impl JointAngles {
    pub fn new(flexion_deg: f64, pronation_deg: f64) -> Self {
        Self {
            flexion_deg,
            pronation_deg,
        }
    }

    /// Both angles NaN, produced when an input orientation has diverged
    pub fn undefined() -> Self {
        Self::new(f64::NAN, f64::NAN)
    }

    pub fn is_finite(&self) -> bool {
        self.flexion_deg.is_finite() && self.pronation_deg.is_finite()
    }
}

/// Joint axes in their sensor frames
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountingAxes {
    /// Flexion hinge axis in the upper-arm sensor (B) frame
    pub flexion: Vec3,
    /// Forearm long axis in the forearm sensor (A) frame
    pub pronation: Vec3,
}

impl Default for MountingAxes {
    fn default() -> Self {
        Self {
            flexion: Vec3::y(),
            pronation: Vec3::x(),
        }
    }
}

impl MountingAxes {
    /// Copy with both axes scaled to unit length
    ///
    /// Zero-length axes fall back to the defaults.
    pub fn normalized(&self) -> Self {
        let defaults = Self::default();
        let unit = |v: &Vec3, fallback: Vec3| v.try_normalize(crate::FLOAT_EPS).unwrap_or(fallback);
        Self {
            flexion: unit(&self.flexion, defaults.flexion),
            pronation: unit(&self.pronation, defaults.pronation),
        }
    }
}

/// Common contract of all joint-angle estimators
///
/// Estimators may carry state across calls, but the output is a
/// deterministic function of the ordered input sequence.
pub trait JointAngleEstimator {
    fn name(&self) -> &'static str;

    /// Consume one synchronized sample of both sensors
    ///
    /// # Arguments
    /// * `r_a` - Forearm sensor orientation (body to world)
    /// * `gyro_a` - Forearm sensor angular velocity [rad/s]
    /// * `r_b` - Upper-arm sensor orientation (body to world)
    /// * `gyro_b` - Upper-arm sensor angular velocity [rad/s]
    fn update(&mut self, r_a: &Mat3, gyro_a: &Vec3, r_b: &Mat3, gyro_b: &Vec3) -> JointAngles;

    /// Axes currently used for the decomposition
    fn axes(&self) -> MountingAxes;
}

/// Closed set of estimator strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EstimatorKind {
    Simple,
    AlignmentFree,
}

impl EstimatorKind {
    /// Parse a configuration name (`simple` or `alignment-free`)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "simple" => Some(Self::Simple),
            "alignment-free" | "alignment_free" => Some(Self::AlignmentFree),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::AlignmentFree => "alignment-free",
        }
    }

    /// Instantiate an estimator of this kind
    pub fn build(
        &self,
        sample_rate_hz: f64,
        axes: MountingAxes,
        params: AlignmentFreeParams,
    ) -> Result<Box<dyn JointAngleEstimator + Send>, crate::CoreError> {
        crate::error::sample_period(sample_rate_hz)?;
        Ok(match self {
            Self::Simple => Box::new(SimpleEstimator::new(axes)),
            Self::AlignmentFree => Box::new(AlignmentFreeEstimator::new(sample_rate_hz, axes, params)?),
        })
    }
}

impl Default for EstimatorKind {
    fn default() -> Self {
        Self::AlignmentFree
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimator_names() {
        assert_eq!(EstimatorKind::from_name("simple"), Some(EstimatorKind::Simple));
        assert_eq!(EstimatorKind::from_name("Alignment-Free"), Some(EstimatorKind::AlignmentFree));
        assert_eq!(EstimatorKind::from_name("fancy"), None);
        assert_eq!(EstimatorKind::from_name(EstimatorKind::Simple.name()), Some(EstimatorKind::Simple));
    }

    #[test]
    fn test_mounting_axes_normalized() {
        let axes = MountingAxes {
            flexion: Vec3::new(0.0, 2.0, 0.0),
            pronation: Vec3::zeros(),
        }
        .normalized();

        assert_eq!(axes.flexion, Vec3::y());
        assert_eq!(axes.pronation, Vec3::x());
    }

    #[test]
    fn test_build_rejects_bad_rate() {
        for kind in [EstimatorKind::Simple, EstimatorKind::AlignmentFree] {
            assert!(kind
                .build(0.0, MountingAxes::default(), AlignmentFreeParams::default())
                .is_err());
        }
    }
}
