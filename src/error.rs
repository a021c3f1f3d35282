//! Pipeline error type.
//!
//! One variant per failure class the orchestrator distinguishes:
//! missing inputs, malformed inputs, unsupported build descriptions
//! and failures to launch the vendor GUI. Plain I/O errors keep the
//! offending path.

use std::path::PathBuf;

use thiserror::Error as ThisError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("input file not found: {path}")]
    InputMissing { path: PathBuf },

    #[error("malformed input {path}: {reason}")]
    InputMalformed { path: PathBuf, reason: String },

    #[error("unknown compiler: {0}")]
    UnknownCompiler(String),

    #[error("cannot resolve CubeMX context for {0}")]
    ContextUnresolved(String),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to launch STM32CubeMX: {0}")]
    VendorLaunchFailed(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::InputMalformed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
