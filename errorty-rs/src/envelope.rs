//! Canonical response envelope `{status, statusCode, message, data, error}`.

use serde::{Serialize, Deserialize};
use serde_json::Value;

pub const DEFAULT_SUCCESS_MESSAGE: &str = "Operation successful";
pub const DEFAULT_ERROR_MESSAGE: &str = "Something went wrong";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub status: ResponseStatus,
    pub status_code: u16,
    pub message: String,
    pub data: Option<Value>,
    pub error: Option<Value>,
    /// Only present when stack traces are exposed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl Envelope {
    /// Builds an envelope; never fails
    pub fn format<M: Into<String>>(
        status: ResponseStatus,
        status_code: u16,
        message: M,
        data: Option<Value>,
        error: Option<Value>,
    ) -> Self {
        Self {
            status,
            status_code,
            message: message.into(),
            data,
            error,
            stack: None,
        }
    }

    pub fn success(message: Option<&str>, status_code: Option<u16>) -> Self {
        Self::format(
            ResponseStatus::Success,
            status_code.unwrap_or(200),
            message.unwrap_or(DEFAULT_SUCCESS_MESSAGE),
            None,
            None,
        )
    }

    pub fn success_with_data(data: Value, message: Option<&str>, status_code: Option<u16>) -> Self {
        Self::format(
            ResponseStatus::Success,
            status_code.unwrap_or(200),
            message.unwrap_or(DEFAULT_SUCCESS_MESSAGE),
            Some(data),
            None,
        )
    }

    /// Error envelopes always carry `data: null`
    pub fn error(error: Value, message: Option<&str>, status_code: Option<u16>) -> Self {
        Self::format(
            ResponseStatus::Error,
            status_code.unwrap_or(500),
            message.unwrap_or(DEFAULT_ERROR_MESSAGE),
            None,
            Some(error),
        )
    }

    pub fn with_stack<S: Into<String>>(mut self, stack: S) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.status == ResponseStatus::Error
    }

    /// Plain-text wire form: `Error: {message}`
    pub fn to_text(&self) -> String {
        format!("Error: {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_envelope_wire_shape() {
        let envelope = Envelope::error(json!({"path": "/missing"}), Some("Cannot GET /missing"), Some(404));
        let wire = serde_json::to_value(&envelope).unwrap();

        assert_eq!(
            wire,
            json!({
                "status": "error",
                "statusCode": 404,
                "message": "Cannot GET /missing",
                "data": null,
                "error": {"path": "/missing"}
            })
        );
    }

    #[test]
    fn test_defaults() {
        let ok = Envelope::success(None, None);
        assert_eq!(ok.status_code, 200);
        assert_eq!(ok.message, DEFAULT_SUCCESS_MESSAGE);
        assert!(!ok.is_error());

        let err = Envelope::error(json!("boom"), None, None);
        assert_eq!(err.status_code, 500);
        assert_eq!(err.message, DEFAULT_ERROR_MESSAGE);
        assert!(err.data.is_none());
        assert_eq!(err.to_text(), "Error: Something went wrong");
    }

    #[test]
    fn test_stack_serialized_only_when_set() {
        let envelope = Envelope::success_with_data(json!([1, 2]), None, Some(201));
        let wire = serde_json::to_string(&envelope).unwrap();
        assert!(!wire.contains("stack"));

        let wire = serde_json::to_value(envelope.with_stack("at main")).unwrap();
        assert_eq!(wire["stack"], "at main");
        assert_eq!(wire["data"], json!([1, 2]));
    }
}
