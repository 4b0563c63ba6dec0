//! Input validation errors
//!
//! Every variant is an invalid-input condition raised before any filter or
//! estimator state is touched. Numerical degeneracies are never reported
//! here; they are absorbed by the step that hits them.

use thiserror::Error;

use crate::Vec3;

/// Errors raised by filters, calibration and estimators
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("Invalid dimension for {what}: expected {expected}, got {got}")]
    InvalidDimension {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("{what} contains non-finite components")]
    NonFinite { what: &'static str },
    #[error("Sampling frequency must be positive and finite, got {0}")]
    InvalidFrequency(f64),
    #[error("Initial covariance must be a 6x6 matrix, got {rows}x{cols}")]
    InvalidCovariance { rows: usize, cols: usize },
    #[error("Parameter {name} must be finite and non-negative, got {value}")]
    InvalidParameter { name: &'static str, value: f64 },
}

/// Build a 3-vector from a dynamically sized slice
///
/// Rejects slices that do not have exactly three finite components.
pub fn vec3_from_slice(what: &'static str, values: &[f64]) -> Result<Vec3, CoreError> {
    if values.len() != 3 {
        return Err(CoreError::InvalidDimension {
            what,
            expected: 3,
            got: values.len(),
        });
    }
    let v = Vec3::new(values[0], values[1], values[2]);
    ensure_finite(what, &v)?;
    Ok(v)
}

/// Reject vectors with NaN or infinite components
pub fn ensure_finite(what: &'static str, v: &Vec3) -> Result<(), CoreError> {
    if v.iter().all(|c| c.is_finite()) {
        Ok(())
    } else {
        Err(CoreError::NonFinite { what })
    }
}

/// Validate a sampling frequency and return the matching period [s]
pub fn sample_period(frequency: f64) -> Result<f64, CoreError> {
    if frequency.is_finite() && frequency > 0.0 {
        Ok(1.0 / frequency)
    } else {
        Err(CoreError::InvalidFrequency(frequency))
    }
}

/// Validate a tuning parameter that must be finite and non-negative
pub fn ensure_parameter(name: &'static str, value: f64) -> Result<f64, CoreError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(CoreError::InvalidParameter { name, value })
    }
}
