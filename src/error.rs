//! Error types for flowgen

use std::io;
use thiserror::Error;

/// Main error type for flowgen operations
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration (file, CLI argument, or derived quantity)
    #[error("invalid configuration: {0}")]
    Config(String),

    /// No initial session could be opened to any server
    #[error("connect error: {0}")]
    Connect(String),

    /// Mid-run failure to open an additional session on demand
    #[error("grow error: {0}")]
    Grow(String),

    /// Arrival schedule produced an unusable interval
    #[error("pacing error: {0}")]
    Pacing(String),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias using the flowgen Error
pub type Result<T> = std::result::Result<T, Error>;
