//! # Error Kinds
//!
//! A kind is an immutable `{name, default_message, status_code}` descriptor.
//! Kinds are registered by name in the [`ErrorRegistry`](crate::registry::ErrorRegistry)
//! and instantiated into [`HttpError`] values when an error is resolved.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;
use std::fmt;
use std::hash::{Hash, Hasher};
use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::status::{HttpStatusCode, INTERNAL_SERVER_ERROR};

/// Name of the generic internal-error kind that unmapped errors fall back to
pub const INTERNAL_KIND_NAME: &str = "HTTP_InternalServerError";

pub const BAD_REQUEST_KIND_NAME: &str = "HTTP_Bad_Request";
pub const UNAUTHORIZED_KIND_NAME: &str = "HTTP_Unauthorized";
pub const FORBIDDEN_KIND_NAME: &str = "HTTP_Forbidden";
pub const NOT_FOUND_KIND_NAME: &str = "HTTP_Not_Found";
pub const CONFLICT_KIND_NAME: &str = "HTTP_Conflict";
pub const UNPROCESSABLE_ENTITY_KIND_NAME: &str = "HTTP_Unprocessable_Entity";
pub const TOO_MANY_REQUESTS_KIND_NAME: &str = "HTTP_Too_Many_Requests";

/// Name given to raw errors that carry no name of their own
pub const GENERIC_ERROR_NAME: &str = "Error";

/// A named classification carrying a fixed status code and default message.
///
/// Two kinds are equal when their name and status code match; the default
/// message does not take part in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpErrorKind {
    pub name: String,
    pub default_message: String,
    pub status_code: u16,
}

impl PartialEq for HttpErrorKind {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.status_code == other.status_code
    }
}

impl Eq for HttpErrorKind {}

impl Hash for HttpErrorKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.status_code.hash(state);
    }
}

impl HttpErrorKind {
    pub fn new<N, M>(name: N, status_code: u16, default_message: M) -> Self
    where
        N: Into<String>,
        M: Into<String>,
    {
        Self {
            name: name.into(),
            default_message: default_message.into(),
            status_code,
        }
    }

    /// Ad-hoc kind whose default message is its own name
    pub fn custom<N: Into<String>>(name: N, status_code: u16) -> Self {
        let name = name.into();
        Self {
            default_message: name.clone(),
            name,
            status_code,
        }
    }

    /// Kind derived from a status table entry, e.g. `HTTPNOT_FOUNDError`
    pub fn from_status(status: HttpStatusCode) -> Self {
        Self::new(status.kind_name(), status.code(), status.reason_phrase())
    }

    /// The generic internal-error kind
    pub fn internal() -> Self {
        Self::new(INTERNAL_KIND_NAME, INTERNAL_SERVER_ERROR, "Internal Server Error")
    }

    pub fn is_internal(&self) -> bool {
        self.status_code == INTERNAL_SERVER_ERROR
    }

    /// Builds an error instance of this kind, capturing a backtrace when the
    /// process has backtraces enabled
    pub fn instantiate(&self, message: Option<String>) -> HttpError {
        self.instantiate_with_stack(message, capture_stack())
    }

    /// Builds an error instance carrying a stack recorded elsewhere
    pub fn instantiate_with_stack(&self, message: Option<String>, stack: Option<String>) -> HttpError {
        let message = message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.default_message.clone());

        HttpError {
            id: Uuid::new_v4(),
            kind: self.clone(),
            message,
            stack,
        }
    }
}

/// Built-in kinds in registration order: the status table first, then the
/// named kinds and their package aliases
pub fn builtin_kinds() -> Vec<HttpErrorKind> {
    let mut kinds: Vec<HttpErrorKind> = HttpStatusCode::ALL
        .iter()
        .map(|status| HttpErrorKind::from_status(*status))
        .collect();

    let named = [
        (BAD_REQUEST_KIND_NAME, 400, "Bad Request"),
        (UNAUTHORIZED_KIND_NAME, 401, "Unauthorized"),
        (FORBIDDEN_KIND_NAME, 403, "Forbidden"),
        (NOT_FOUND_KIND_NAME, 404, "Not Found"),
        (CONFLICT_KIND_NAME, 409, "Conflict"),
        (UNPROCESSABLE_ENTITY_KIND_NAME, 422, "Unprocessable Entity"),
        (TOO_MANY_REQUESTS_KIND_NAME, 429, "Too Many Requests"),
        (INTERNAL_KIND_NAME, 500, "Internal Server Error"),
        ("HttpBadRequest", 400, "Bad Request"),
        ("HttpConflict", 409, "Conflict"),
        ("HttpInternalServerError", 500, "Internal Server Error"),
    ];
    kinds.extend(
        named
            .iter()
            .map(|(name, code, message)| HttpErrorKind::new(*name, *code, *message)),
    );

    kinds
}

fn capture_stack() -> Option<String> {
    captured_text(&Backtrace::capture())
}

fn captured_text(backtrace: &Backtrace) -> Option<String> {
    match backtrace.status() {
        BacktraceStatus::Captured => Some(backtrace.to_string()),
        _ => None,
    }
}

/// An error already classified into a kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpError {
    /// A unique identifier for this error instance
    pub id: Uuid,
    pub kind: HttpErrorKind,
    pub message: String,
    /// Backtrace text (not serialized)
    #[serde(skip)]
    pub stack: Option<String>,
}

impl HttpError {
    /// Creates an error of an ad-hoc kind
    pub fn new<M: Into<String>>(name: &str, status_code: u16, message: M) -> Self {
        HttpErrorKind::custom(name, status_code).instantiate(Some(message.into()))
    }

    pub fn bad_request() -> Self {
        HttpErrorKind::new(BAD_REQUEST_KIND_NAME, 400, "Bad Request").instantiate(None)
    }

    pub fn unauthorized() -> Self {
        HttpErrorKind::new(UNAUTHORIZED_KIND_NAME, 401, "Unauthorized").instantiate(None)
    }

    pub fn forbidden() -> Self {
        HttpErrorKind::new(FORBIDDEN_KIND_NAME, 403, "Forbidden").instantiate(None)
    }

    pub fn not_found() -> Self {
        HttpErrorKind::new(NOT_FOUND_KIND_NAME, 404, "Not Found").instantiate(None)
    }

    pub fn conflict() -> Self {
        HttpErrorKind::new(CONFLICT_KIND_NAME, 409, "Conflict").instantiate(None)
    }

    pub fn unprocessable_entity() -> Self {
        HttpErrorKind::new(UNPROCESSABLE_ENTITY_KIND_NAME, 422, "Unprocessable Entity")
            .instantiate(None)
    }

    pub fn too_many_requests() -> Self {
        HttpErrorKind::new(TOO_MANY_REQUESTS_KIND_NAME, 429, "Too Many Requests").instantiate(None)
    }

    pub fn internal_server_error() -> Self {
        HttpErrorKind::internal().instantiate(None)
    }

    /// Replaces the message, keeping kind and id
    pub fn with_message<M: Into<String>>(mut self, message: M) -> Self {
        self.message = message.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.kind.name
    }

    pub fn status_code(&self) -> u16 {
        self.kind.status_code
    }

    /// True when both errors are instances of the same kind
    pub fn same_kind(&self, other: &HttpError) -> bool {
        self.kind == other.kind
    }

    /// Detail payload placed in the `error` field of an envelope
    pub fn payload(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.kind.name,
            "message": self.message,
            "statusCode": self.kind.status_code,
        })
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.name, self.message)
    }
}

impl StdError for HttpError {}

/// The raw error handed to the dispatcher by the host framework
#[derive(Debug, Clone)]
pub enum RaisedError {
    /// Already an instance of a kind; used as-is
    Classified(HttpError),
    /// Anything else; resolved by name through the registry
    Unclassified {
        name: String,
        message: String,
        stack: Option<String>,
    },
}

impl RaisedError {
    pub fn named<N, M>(name: N, message: M) -> Self
    where
        N: Into<String>,
        M: Into<String>,
    {
        RaisedError::Unclassified {
            name: name.into(),
            message: message.into(),
            stack: capture_stack(),
        }
    }

    /// Classifies any standard error, recognising [`HttpError`] by downcast.
    /// Plain errors carry no stack; one captured here would show the caller
    /// of this function instead of the raise site.
    pub fn from_std(err: &(dyn StdError + 'static)) -> Self {
        match err.downcast_ref::<HttpError>() {
            Some(http) => RaisedError::Classified(http.clone()),
            None => RaisedError::Unclassified {
                name: GENERIC_ERROR_NAME.to_string(),
                message: err.to_string(),
                stack: None,
            },
        }
    }

    pub fn name(&self) -> &str {
        match self {
            RaisedError::Classified(err) => err.name(),
            RaisedError::Unclassified { name, .. } => name,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            RaisedError::Classified(err) => &err.message,
            RaisedError::Unclassified { message, .. } => message,
        }
    }

    pub fn stack(&self) -> Option<&str> {
        match self {
            RaisedError::Classified(err) => err.stack.as_deref(),
            RaisedError::Unclassified { stack, .. } => stack.as_deref(),
        }
    }
}

impl From<HttpError> for RaisedError {
    fn from(err: HttpError) -> Self {
        RaisedError::Classified(err)
    }
}

impl From<anyhow::Error> for RaisedError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(http) = err.downcast_ref::<HttpError>() {
            return RaisedError::Classified(http.clone());
        }

        // anyhow records its backtrace where the error was created
        RaisedError::Unclassified {
            name: GENERIC_ERROR_NAME.to_string(),
            message: err.to_string(),
            stack: captured_text(err.backtrace()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_instantiate_uses_default_message() {
        let kind = HttpErrorKind::new("PaymentDeclined", 402, "Payment was declined");

        let err = kind.instantiate(None);
        assert_eq!(err.message, "Payment was declined");
        assert_eq!(err.status_code(), 402);

        let err = kind.instantiate(Some("Card expired".to_string()));
        assert_eq!(err.message, "Card expired");

        let err = kind.instantiate(Some(String::new()));
        assert_eq!(err.message, "Payment was declined");
    }

    #[test]
    fn test_kind_equality_ignores_message() {
        let a = HttpErrorKind::new("Teapot", 418, "I'm a teapot");
        let b = HttpErrorKind::new("Teapot", 418, "Short and stout");
        let c = HttpErrorKind::new("Teapot", 400, "I'm a teapot");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.instantiate(None).same_kind(&b.instantiate(None)));
    }

    #[test]
    fn test_builtin_kinds_contain_internal() {
        let kinds = builtin_kinds();
        assert!(kinds.iter().any(|k| k.name == INTERNAL_KIND_NAME && k.status_code == 500));
        assert!(kinds.iter().any(|k| k.name == "HTTPTOO_MANY_REQUESTSError"));
        assert!(kinds.iter().any(|k| k.name == "HttpConflict" && k.status_code == 409));
    }

    #[test]
    fn test_named_constructors() {
        assert_eq!(HttpError::bad_request().message, "Bad Request");
        assert_eq!(HttpError::unauthorized().status_code(), 401);
        assert_eq!(HttpError::not_found().name(), NOT_FOUND_KIND_NAME);
        assert_eq!(
            HttpError::conflict().with_message("Duplicate email").to_string(),
            "HTTP_Conflict: Duplicate email"
        );
    }

    #[test]
    fn test_raised_error_from_std() {
        let io_err = io::Error::new(io::ErrorKind::Other, "disk on fire");
        let raised = RaisedError::from_std(&io_err);
        assert_eq!(raised.name(), GENERIC_ERROR_NAME);
        assert_eq!(raised.message(), "disk on fire");

        let http = HttpError::forbidden();
        let raised = RaisedError::from_std(&http);
        assert!(matches!(raised, RaisedError::Classified(_)));
        assert_eq!(raised.name(), FORBIDDEN_KIND_NAME);
    }

    #[test]
    fn test_raised_error_from_anyhow() {
        let raised: RaisedError = anyhow::Error::new(HttpError::too_many_requests()).into();
        assert!(matches!(raised, RaisedError::Classified(_)));

        let raised: RaisedError = anyhow::anyhow!("Test error").into();
        assert_eq!(raised.name(), GENERIC_ERROR_NAME);
        assert_eq!(raised.message(), "Test error");
    }

    fn failing_handler() -> anyhow::Result<()> {
        Err(anyhow::anyhow!("db down"))
    }

    #[test]
    fn test_anyhow_stack_comes_from_raise_site() {
        let err = failing_handler().unwrap_err();
        let expected = captured_text(err.backtrace());

        let raised = RaisedError::from(err);
        assert_eq!(raised.stack().map(str::to_string), expected);
    }

    #[test]
    fn test_std_error_carries_no_conversion_stack() {
        let io_err = io::Error::new(io::ErrorKind::Other, "disk on fire");
        assert!(RaisedError::from_std(&io_err).stack().is_none());
    }

    #[test]
    fn test_instantiate_with_stack_keeps_given_stack() {
        let kind = HttpErrorKind::custom("PaymentDeclined", 402);

        let err = kind.instantiate_with_stack(None, None);
        assert!(err.stack.is_none());
        assert_eq!(err.message, "PaymentDeclined");

        let err = kind.instantiate_with_stack(Some("card expired".into()), Some("at checkout".into()));
        assert_eq!(err.stack.as_deref(), Some("at checkout"));
        assert_eq!(err.message, "card expired");
    }
}
