//! Session pipeline
//!
//! One session is a synchronous fold over its sample pairs:
//!
//! 1. Estimate the gyro bias of each sensor over the leading stationary window
//!    and subtract it from every sample.
//! 2. Update one orientation filter per sensor.
//! 3. Feed both orientations and bias-corrected rates to the estimator.
//! 4. Wrap FE and PS independently into (-180, 180].
//!
//! Filters and estimator are built fresh for every session, so a pipeline can
//! be shared between threads and reused; the output depends only on the
//! configuration and the ordered input.

use elbow_core::calibration::CalibratedStream;
use elbow_core::error::sample_period;
use elbow_core::estimation::EstimatorKind;
use elbow_core::filter::{FilterKind, OrientationFilter};
use elbow_core::sample::{SamplePair, Sensor};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::records::{AngleRow, ImuReading};
use crate::session::{AngleReading, ProcessedSample, SessionResult};

/// Configured, validated session processor
#[derive(Debug, Clone)]
pub struct SessionPipeline {
    config: SessionConfig,
    filter_a: FilterKind,
    filter_b: FilterKind,
    estimator: EstimatorKind,
}

impl SessionPipeline {
    /// Resolve variant names and validate every parameter
    ///
    /// Unknown variant names fall back to defaults (with a warning); invalid
    /// numeric parameters are errors.
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        sample_period(config.sample_rate_hz)?;

        let pipeline = Self {
            filter_a: config.filter_kind(Sensor::A),
            filter_b: config.filter_kind(Sensor::B),
            estimator: config.estimator_kind(),
            config,
        };

        // Surface parameter errors at setup rather than on the first session
        pipeline.build_filter(pipeline.filter_a)?;
        pipeline.build_filter(pipeline.filter_b)?;
        pipeline.estimator.build(
            pipeline.config.sample_rate_hz,
            pipeline.config.mounting,
            pipeline.config.alignment_free,
        )?;

        tracing::info!(
            sample_rate_hz = pipeline.config.sample_rate_hz,
            filter_a = pipeline.filter_a.name(),
            filter_b = pipeline.filter_b.name(),
            estimator = pipeline.estimator.name(),
            "Session pipeline configured"
        );

        Ok(pipeline)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
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

    fn build_filter(
        &self,
        kind: FilterKind,
    ) -> Result<Box<dyn OrientationFilter + Send>, SessionError> {
        Ok(kind.build(self.config.sample_rate_hz, &self.config.filters)?)
    }

    /// Process one session of time-ordered sample pairs
    ///
    /// An invalid sample aborts the session; no partial result is returned.
    pub fn process<I>(&self, samples: I) -> Result<SessionResult, SessionError>
    where
        I: IntoIterator<Item = SamplePair>,
    {
        let span = tracing::info_span!(
            "session",
            filter_a = self.filter_a.name(),
            filter_b = self.filter_b.name(),
            estimator = self.estimator.name()
        );
        let _enter = span.enter();

        let mut filter_a = self.build_filter(self.filter_a)?;
        let mut filter_b = self.build_filter(self.filter_b)?;
        let mut estimator = self.estimator.build(
            self.config.sample_rate_hz,
            self.config.mounting,
            self.config.alignment_free,
        )?;

        let stream = CalibratedStream::new(samples, self.config.calibration_window);
        let calibration = *stream.calibration();

        let mut processed = Vec::new();
        for (index, pair) in stream.enumerate() {
            let sample_error = |source| SessionError::Sample { index, source };
            filter_a.update(&pair.a.acc, &pair.a.gyro).map_err(sample_error)?;
            filter_b.update(&pair.b.acc, &pair.b.gyro).map_err(sample_error)?;

            let raw = estimator.update(
                &filter_a.rotation_matrix(),
                &pair.a.gyro,
                &filter_b.rotation_matrix(),
                &pair.b.gyro,
            );
            processed.push(ProcessedSample {
                sample: pair,
                angles: AngleReading::from_raw(raw),
            });
        }

        let skipped = [filter_a.skipped_corrections(), filter_b.skipped_corrections()];
        let diverged = !filter_a.is_finite() || !filter_b.is_finite();
        if diverged {
            tracing::warn!(
                finite_a = filter_a.is_finite(),
                finite_b = filter_b.is_finite(),
                "Orientation diverged during session"
            );
        }
        tracing::info!(
            samples = processed.len(),
            skipped_a = skipped[0],
            skipped_b = skipped[1],
            "Session processed"
        );

        Ok(SessionResult::new(
            processed,
            calibration,
            (self.filter_a, self.filter_b),
            self.estimator,
            skipped,
        ))
    }

    /// Process device rows and return them augmented with the angles
    pub fn process_readings(&self, readings: &[ImuReading]) -> Result<Vec<AngleRow>, SessionError> {
        let result = self.process(readings.iter().map(SamplePair::from))?;

        Ok(readings
            .iter()
            .zip(result.samples())
            .map(|(reading, processed)| {
                let mut corrected = ImuReading::from_pair(&processed.sample);
                corrected.pc_time_iso = reading.pc_time_iso.clone();
                AngleRow::new(corrected, processed.angles)
            })
            .collect())
    }
}
