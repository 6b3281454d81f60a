//! # Crate Error Types
//!
//! Failures raised by the registry, the kind loaders and the logging setup.
//! Request-level errors never surface here: the dispatcher absorbs those and
//! turns them into responses.

use thiserror::Error;

/// A type alias for Result with the error type defaulting to our Error
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures of the error-handling layer itself.
///
/// `Clone` so one in-flight initialization result can be handed to every
/// caller waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// A kind source (directory or file) could not be read
    #[error("failed to load error kinds from {path}: {reason}")]
    KindLoad { path: String, reason: String },

    /// A kind definition was readable but malformed
    #[error("invalid error kind definition in {source_name}: {reason}")]
    InvalidKind { source_name: String, reason: String },

    /// A configuration value could not be interpreted
    #[error("configuration error: {0}")]
    Configuration(String),

    /// JSON encoding or decoding failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Global setup (subscriber installation) failed
    #[error("initialization error: {0}")]
    Initialization(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::KindLoad {
            path: "<unknown>".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Configuration(err.to_string())
    }
}
