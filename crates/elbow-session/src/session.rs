//! Session results

use elbow_core::calibration::GyroCalibration;
use elbow_core::estimation::{EstimatorKind, JointAngles};
use elbow_core::filter::FilterKind;
use elbow_core::math::normalize_angle_deg;
use elbow_core::sample::{SamplePair, Sensor};
use serde::{Deserialize, Serialize};

use crate::records::{AngleRow, ImuReading};

/// Joint angles of one sample, each wrapped to (-180, 180] degrees
///
/// Both are NaN when a sensor orientation diverged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleReading {
    pub flexion_deg: f64,
    pub pronation_deg: f64,
}

impl AngleReading {
    /// Wrap raw estimator output, FE and PS independently
    pub fn from_raw(raw: JointAngles) -> Self {
        Self {
            flexion_deg: normalize_angle_deg(raw.flexion_deg),
            pronation_deg: normalize_angle_deg(raw.pronation_deg),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.flexion_deg.is_finite() && self.pronation_deg.is_finite()
    }
}

/// A bias-corrected sample pair and its angles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessedSample {
    pub sample: SamplePair,
    pub angles: AngleReading,
}

/// Range statistics of one angle over the finite readings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl AngleStats {
    fn from_values(values: impl Iterator<Item = f64>) -> Option<Self> {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in values {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }

        (count > 0).then(|| Self {
            min,
            max,
            mean: sum / count as f64,
        })
    }
}

/// Angle summary of a whole session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub samples: usize,
    /// Readings with a NaN angle (diverged orientation)
    pub non_finite: usize,
    /// `None` when no reading is finite
    pub flexion: Option<AngleStats>,
    pub pronation: Option<AngleStats>,
}

/// Outcome of processing one session
///
/// One [`ProcessedSample`] per input pair, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    samples: Vec<ProcessedSample>,
    calibration: GyroCalibration,
    filter_a: FilterKind,
    filter_b: FilterKind,
    estimator: EstimatorKind,
    skipped_corrections: [u64; 2],
}

impl SessionResult {
    pub(crate) fn new(
        samples: Vec<ProcessedSample>,
        calibration: GyroCalibration,
        filters: (FilterKind, FilterKind),
        estimator: EstimatorKind,
        skipped_corrections: [u64; 2],
    ) -> Self {
        Self {
            samples,
            calibration,
            filter_a: filters.0,
            filter_b: filters.1,
            estimator,
            skipped_corrections,
        }
    }

    pub fn samples(&self) -> &[ProcessedSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Angles in input order
    pub fn angles(&self) -> impl Iterator<Item = AngleReading> + '_ {
        self.samples.iter().map(|s| s.angles)
    }

    pub fn calibration(&self) -> &GyroCalibration {
        &self.calibration
    }

    pub fn filter_kind(&self, sensor: Sensor) -> FilterKind {
        match sensor {
            Sensor::A => self.filter_a,
            Sensor::B => self.filter_b,
        }
    }

    pub fn estimator_kind(&self) -> EstimatorKind {
        self.estimator
    }

    /// Gravity corrections skipped by one sensor's filter
    pub fn skipped_corrections(&self, sensor: Sensor) -> u64 {
        match sensor {
            Sensor::A => self.skipped_corrections[0],
            Sensor::B => self.skipped_corrections[1],
        }
    }

    pub fn summary(&self) -> SessionSummary {
        let finite = || self.angles().filter(AngleReading::is_finite);
        SessionSummary {
            samples: self.len(),
            non_finite: self.angles().filter(|a| !a.is_finite()).count(),
            flexion: AngleStats::from_values(finite().map(|a| a.flexion_deg)),
            pronation: AngleStats::from_values(finite().map(|a| a.pronation_deg)),
        }
    }

    /// Output rows for external persistence
    pub fn rows(&self) -> Vec<AngleRow> {
        self.samples
            .iter()
            .map(|s| AngleRow::new(ImuReading::from_pair(&s.sample), s.angles))
            .collect()
    }
}
