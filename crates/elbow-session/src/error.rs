//! Session errors

use std::path::PathBuf;

use elbow_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("Sample {index} rejected: {source}")]
    Sample {
        index: usize,
        #[source]
        source: CoreError,
    },
    #[error("Invalid session config: {0}")]
    Config(#[from] toml::de::Error),
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
