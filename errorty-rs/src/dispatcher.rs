//! # Error Dispatcher
//!
//! Turns raw errors raised during request handling into response
//! descriptors: resolve the error to a kind, pick the public message, log,
//! and build the envelope. Per-request errors never propagate past
//! [`ErrorDispatcher::dispatch`]. Fatal process-level failures go through
//! [`ErrorDispatcher::report_fatal`], which ends the process.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use metrics::counter;
use serde::{Serialize, Deserialize};
use serde_json::{json, Map, Value};

use crate::context::DispatchContext;
use crate::envelope::{Envelope, DEFAULT_ERROR_MESSAGE};
use crate::kind::{HttpError, RaisedError, INTERNAL_KIND_NAME};
use crate::logger::{ErrorLogger, LogMessage};
use crate::policy::{ErrortyConfig, ResponseEncoding};
use crate::registry::{ErrorRegistry, LifecycleState};
use crate::sanitization::sanitize_message;
use crate::status::NOT_FOUND;
use crate::types::Result;

/// Public message for internal errors in production
pub const PRODUCTION_INTERNAL_MESSAGE: &str = "Internal Server Error";

/// Capability to set a status code and send a body, supplied by the host
pub trait ResponseSink {
    fn send(&mut self, status_code: u16, content_type: &str, body: String);
}

/// What the host should send back
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResponse {
    pub status_code: u16,
    pub encoding: ResponseEncoding,
    pub envelope: Envelope,
}

impl DispatchResponse {
    pub fn content_type(&self) -> &'static str {
        match self.encoding {
            ResponseEncoding::Json => "application/json",
            ResponseEncoding::Text => "text/plain; charset=utf-8",
        }
    }

    /// Encoded body: the JSON envelope or `Error: {message}`
    pub fn body(&self) -> Result<String> {
        match self.encoding {
            ResponseEncoding::Json => Ok(serde_json::to_string(&self.envelope)?),
            ResponseEncoding::Text => Ok(self.envelope.to_text()),
        }
    }

    pub fn write_to<S: ResponseSink + ?Sized>(&self, sink: &mut S) -> Result<()> {
        let body = self.body()?;
        sink.send(self.status_code, self.content_type(), body);
        Ok(())
    }
}

/// Ends the host process after a fatal report
pub trait ProcessTerminator: Send + Sync + fmt::Debug {
    fn terminate(&self, exit_code: i32);
}

/// Exits the current process
#[derive(Debug, Default)]
pub struct ExitProcess;

impl ProcessTerminator for ExitProcess {
    fn terminate(&self, exit_code: i32) {
        std::process::exit(exit_code);
    }
}

/// Where a fatal condition came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FatalSource {
    UncaughtError,
    UnhandledRejection,
}

impl fmt::Display for FatalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatalSource::UncaughtError => write!(f, "Uncaught error"),
            FatalSource::UnhandledRejection => write!(f, "Unhandled rejection"),
        }
    }
}

/// Inner cause attached to a fatal report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FatalReason {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// An unrecoverable failure with no request context
#[derive(Debug, Clone, PartialEq)]
pub struct FatalReport {
    pub source: FatalSource,
    pub message: String,
    pub stack: Option<String>,
    pub reason: Option<FatalReason>,
}

impl FatalReport {
    pub fn uncaught(err: &(dyn StdError + 'static)) -> Self {
        let raised = RaisedError::from_std(err);
        let reason = err.source().map(|inner| FatalReason {
            message: inner.to_string(),
            stack: None,
        });

        Self {
            source: FatalSource::UncaughtError,
            message: raised.message().to_string(),
            stack: raised.stack().map(str::to_string),
            reason,
        }
    }

    pub fn rejection<M: Into<String>>(message: M) -> Self {
        Self {
            source: FatalSource::UnhandledRejection,
            message: message.into(),
            stack: None,
            reason: None,
        }
    }

    pub fn with_reason<M: Into<String>>(mut self, message: M, stack: Option<String>) -> Self {
        self.reason = Some(FatalReason {
            message: message.into(),
            stack,
        });
        self
    }

    fn log_payload(&self) -> LogMessage {
        let mut meta = Map::new();
        meta.insert("source".to_string(), json!(self.source));
        meta.insert("errorMessage".to_string(), Value::String(self.message.clone()));
        if let Some(stack) = &self.stack {
            meta.insert("stack".to_string(), Value::String(stack.clone()));
        }
        if let Some(reason) = &self.reason {
            meta.insert("reason".to_string(), json!(reason));
        }

        LogMessage::structured(format!("{}: {}", self.source, self.message), meta)
    }
}

/// Maps raw errors to responses through an [`ErrorRegistry`]
#[derive(Debug, Clone)]
pub struct ErrorDispatcher {
    /// `None` follows the process-wide registry, including reconfigurations
    registry: Option<Arc<ErrorRegistry>>,
    terminator: Arc<dyn ProcessTerminator>,
}

impl Default for ErrorDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorDispatcher {
    /// Dispatcher bound to the process-wide registry
    pub fn new() -> Self {
        Self {
            registry: None,
            terminator: Arc::new(ExitProcess),
        }
    }

    /// Dispatcher pinned to one registry instance
    pub fn with_registry(registry: Arc<ErrorRegistry>) -> Self {
        Self {
            registry: Some(registry),
            terminator: Arc::new(ExitProcess),
        }
    }

    pub fn with_terminator(mut self, terminator: Arc<dyn ProcessTerminator>) -> Self {
        self.terminator = terminator;
        self
    }

    pub fn registry(&self) -> Arc<ErrorRegistry> {
        match &self.registry {
            Some(registry) => Arc::clone(registry),
            None => ErrorRegistry::get_or_create(),
        }
    }

    /// Eager asynchronous initialization, normally called at startup
    pub async fn initialize(&self, config: Option<ErrortyConfig>) -> Result<()> {
        self.registry().initialize_async(config).await
    }

    /// Eager synchronous initialization; directory sources are skipped
    pub fn initialize_sync(&self, config: Option<ErrortyConfig>) {
        self.registry().initialize_sync(config);
    }

    pub fn is_initialized(&self) -> bool {
        self.registry().is_ready()
    }

    /// Converts a raw error into a response descriptor. Writes exactly one
    /// error-severity log entry.
    pub fn dispatch<E: Into<RaisedError>>(&self, error: E, context: &DispatchContext) -> DispatchResponse {
        let registry = self.registry();
        match registry.initialize_sync_if_uninitialized() {
            LifecycleState::Ready => {}
            LifecycleState::Uninitialized => registry.logger().warn(LogMessage::from(
                "Error dispatcher used before initialization; initializing synchronously. Initialize it at startup instead.",
            )),
            LifecycleState::Initializing => registry.logger().warn(LogMessage::from(
                "Error dispatcher used while initialization is in progress; directory kinds are not available yet.",
            )),
        }

        let policy = registry.policy();
        let logger = registry.logger();

        let resolved = resolve(&registry, logger.as_ref(), error.into());
        let status_code = resolved.status_code();
        let hide_detail = resolved.kind.is_internal() && policy.is_production();

        let message = if hide_detail || resolved.message.is_empty() {
            PRODUCTION_INTERNAL_MESSAGE.to_string()
        } else {
            resolved.message.clone()
        };

        let summary = format!("Error: {} | Status Code: {}", sanitize_message(&message), status_code);
        if policy.log_request_details {
            let mut meta = context.log_fields();
            meta.insert("errorId".to_string(), Value::String(resolved.id.to_string()));
            meta.insert("errorName".to_string(), Value::String(resolved.name().to_string()));
            meta.insert("errorMessage".to_string(), Value::String(sanitize_message(&resolved.message)));
            meta.insert("statusCode".to_string(), Value::from(status_code));
            if let Some(stack) = &resolved.stack {
                meta.insert("stack".to_string(), Value::String(stack.clone()));
            }
            logger.error(LogMessage::structured(summary, meta));
        } else {
            logger.error(LogMessage::Text(summary));
        }

        let payload = if hide_detail {
            Value::String(DEFAULT_ERROR_MESSAGE.to_string())
        } else {
            resolved.payload()
        };

        let mut envelope = Envelope::error(payload, Some(&message), Some(status_code));
        if policy.exposes_stack_trace() {
            if let Some(stack) = &resolved.stack {
                envelope = envelope.with_stack(stack.clone());
            }
        }

        counter!("errorty.dispatch.total", 1, "status" => status_code.to_string());

        DispatchResponse {
            status_code,
            encoding: policy.response_encoding,
            envelope,
        }
    }

    /// Response for a request no route matched: `Cannot {METHOD} {PATH}`
    pub fn not_found(&self, context: &DispatchContext) -> DispatchResponse {
        let registry = self.registry();
        let policy = registry.policy();
        let message = format!("Cannot {} {}", context.method, context.path);

        let mut meta = Map::new();
        meta.insert("method".to_string(), Value::String(context.method.clone()));
        meta.insert("path".to_string(), Value::String(context.path.clone()));
        registry.logger().warn(LogMessage::structured(message.clone(), meta));

        counter!("errorty.not_found.total", 1);

        DispatchResponse {
            status_code: NOT_FOUND,
            encoding: policy.response_encoding,
            envelope: Envelope::error(json!({ "path": context.path }), Some(&message), Some(NOT_FOUND)),
        }
    }

    /// Logs a fatal condition with full detail, then terminates the process
    pub fn report_fatal(&self, report: FatalReport) {
        let registry = self.registry();
        registry.logger().fatal(report.log_payload());
        counter!("errorty.fatal.total", 1);

        self.terminator.terminate(1);
    }
}

/// Classified errors pass through; others resolve by name, falling back to
/// the internal-error kind with a warning
fn resolve(registry: &ErrorRegistry, logger: &dyn ErrorLogger, error: RaisedError) -> HttpError {
    match error {
        RaisedError::Classified(err) => err,
        RaisedError::Unclassified { name, message, stack } => {
            let kind = match registry.resolve_kind(&name) {
                Some(kind) => kind,
                None => {
                    let mut meta = Map::new();
                    meta.insert("errorName".to_string(), Value::String(name.clone()));
                    logger.warn(LogMessage::structured(
                        format!("No error kind registered for '{}'; using {}", name, INTERNAL_KIND_NAME),
                        meta,
                    ));
                    counter!("errorty.dispatch.unmapped", 1);
                    registry.internal_kind()
                }
            };

            // Only the raise site's stack is meaningful here
            kind.instantiate_with_stack(Some(message), stack)
        }
    }
}
