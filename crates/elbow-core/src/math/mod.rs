//! Mathematical utilities
//!
//! Quaternion operations, SO(3) rotation helpers and angle wrapping shared by
//! the filters and joint-angle estimators.

pub mod quaternion;
pub mod rotation;
pub mod angles;

pub use quaternion::*;
pub use rotation::*;
pub use angles::*;
