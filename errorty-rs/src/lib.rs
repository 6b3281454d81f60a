//! # Errorty
//!
//! Error classification and response dispatch for HTTP request handlers.
//! Any error raised while serving a request is mapped to a status code and a
//! sanitized message, logged according to policy, and returned as a
//! structured response envelope.
//!
//! ## Features
//!
//! - Name-keyed registry of error kinds with built-in HTTP kinds
//! - Custom kinds from a name/status map, an explicit list, or a directory
//! - One-time initialization shared by concurrent callers, with a
//!   synchronous path for hosts that cannot await at startup
//! - Production-safe messages and optional stack traces elsewhere
//! - Full-context or one-line summary logging with credential redaction
//! - JSON or plain-text responses, with an axum adapter
//!

pub mod types;
pub mod status;
pub mod kind;
pub mod environment;
pub mod logger;
pub mod policy;
pub mod loader;
pub mod registry;
pub mod context;
pub mod sanitization;
pub mod envelope;
pub mod dispatcher;
#[cfg(feature = "axum")]
pub mod http;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use types::{Error, Result};
pub use status::HttpStatusCode;
pub use kind::{HttpError, HttpErrorKind, RaisedError};
pub use environment::Environment;
pub use logger::{init_logging, ErrorLogger, LeveledLogger, LogLevel, LogMessage, LoggingConfig, RecordingLogger};
pub use policy::{ErrorOverrides, ErrortyConfig, Policy, ResponseEncoding};
pub use loader::{DirectoryKindLoader, KindLoader};
pub use registry::{ErrorRegistry, LifecycleState};
pub use context::DispatchContext;
pub use envelope::{Envelope, ResponseStatus};
pub use dispatcher::{DispatchResponse, ErrorDispatcher, FatalReport, ProcessTerminator, ResponseSink};

/// Installs logging and initializes the process-wide registry with defaults
pub async fn init() -> Result<()> {
    init_logging(None)?;
    ErrorRegistry::get_or_create().initialize_async(None).await
}

/// Installs logging and rebuilds the process-wide registry from a
/// `config::Config` source (`logging.*` and `errorty.*` keys)
pub async fn init_with_config(config: config::Config) -> Result<()> {
    let log_config = LoggingConfig::try_from(config.clone()).ok();
    let errorty_config = ErrortyConfig::try_from(config)?;

    init_logging(log_config)?;
    ErrorRegistry::reconfigure(errorty_config).await?;
    Ok(())
}
