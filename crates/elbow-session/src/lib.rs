//! Elbow Session
//!
//! Turns a recorded session of paired IMU readings (sensor A on the forearm,
//! sensor B on the upper arm) into a series of elbow joint angles.
//!
//! # Pipeline
//!
//! ```text
//! readings ─► gyro calibration ─► filter A ─┐
//!                                └► filter B ─┴► estimator ─► normalize ─► angles
//! ```
//!
//! # Components
//!
//! - [`config`]: Session configuration, loadable from TOML
//! - [`pipeline`]: Per-session orchestration of calibration, filters and estimator
//! - [`session`]: Session results and summaries
//! - [`records`]: Ingestion and output records of the recording device
//! - [`scenarios`]: Synthetic sessions with known ground truth

pub mod error;
pub mod config;
pub mod records;
pub mod session;
pub mod pipeline;
pub mod scenarios;

// Re-exports
pub use config::SessionConfig;
pub use error::SessionError;
pub use pipeline::SessionPipeline;
pub use session::{AngleReading, SessionResult};
