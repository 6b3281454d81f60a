//! Standard HTTP error status codes known to the registry.

use std::fmt;
use serde::{Serialize, Deserialize};

/// HTTP error statuses for which a built-in kind is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpStatusCode {
    BadRequest,
    Unauthorized,
    PaymentRequired,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    NotAcceptable,
    RequestTimeout,
    Conflict,
    Gone,
    PayloadTooLarge,
    UnsupportedMediaType,
    UnprocessableEntity,
    TooManyRequests,
    InternalServerError,
    NotImplemented,
    BadGateway,
    ServiceUnavailable,
    GatewayTimeout,
}

/// Status code of the generic internal-error kind
pub const INTERNAL_SERVER_ERROR: u16 = 500;

/// Status code used for unmatched routes
pub const NOT_FOUND: u16 = 404;

impl HttpStatusCode {
    /// Every status in the table, in ascending code order
    pub const ALL: [HttpStatusCode; 19] = [
        HttpStatusCode::BadRequest,
        HttpStatusCode::Unauthorized,
        HttpStatusCode::PaymentRequired,
        HttpStatusCode::Forbidden,
        HttpStatusCode::NotFound,
        HttpStatusCode::MethodNotAllowed,
        HttpStatusCode::NotAcceptable,
        HttpStatusCode::RequestTimeout,
        HttpStatusCode::Conflict,
        HttpStatusCode::Gone,
        HttpStatusCode::PayloadTooLarge,
        HttpStatusCode::UnsupportedMediaType,
        HttpStatusCode::UnprocessableEntity,
        HttpStatusCode::TooManyRequests,
        HttpStatusCode::InternalServerError,
        HttpStatusCode::NotImplemented,
        HttpStatusCode::BadGateway,
        HttpStatusCode::ServiceUnavailable,
        HttpStatusCode::GatewayTimeout,
    ];

    pub fn code(self) -> u16 {
        match self {
            HttpStatusCode::BadRequest => 400,
            HttpStatusCode::Unauthorized => 401,
            HttpStatusCode::PaymentRequired => 402,
            HttpStatusCode::Forbidden => 403,
            HttpStatusCode::NotFound => 404,
            HttpStatusCode::MethodNotAllowed => 405,
            HttpStatusCode::NotAcceptable => 406,
            HttpStatusCode::RequestTimeout => 408,
            HttpStatusCode::Conflict => 409,
            HttpStatusCode::Gone => 410,
            HttpStatusCode::PayloadTooLarge => 413,
            HttpStatusCode::UnsupportedMediaType => 415,
            HttpStatusCode::UnprocessableEntity => 422,
            HttpStatusCode::TooManyRequests => 429,
            HttpStatusCode::InternalServerError => 500,
            HttpStatusCode::NotImplemented => 501,
            HttpStatusCode::BadGateway => 502,
            HttpStatusCode::ServiceUnavailable => 503,
            HttpStatusCode::GatewayTimeout => 504,
        }
    }

    /// Upper snake case constant name, e.g. `BAD_REQUEST`
    pub fn constant_name(self) -> &'static str {
        match self {
            HttpStatusCode::BadRequest => "BAD_REQUEST",
            HttpStatusCode::Unauthorized => "UNAUTHORIZED",
            HttpStatusCode::PaymentRequired => "PAYMENT_REQUIRED",
            HttpStatusCode::Forbidden => "FORBIDDEN",
            HttpStatusCode::NotFound => "NOT_FOUND",
            HttpStatusCode::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            HttpStatusCode::NotAcceptable => "NOT_ACCEPTABLE",
            HttpStatusCode::RequestTimeout => "REQUEST_TIMEOUT",
            HttpStatusCode::Conflict => "CONFLICT",
            HttpStatusCode::Gone => "GONE",
            HttpStatusCode::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            HttpStatusCode::UnsupportedMediaType => "UNSUPPORTED_MEDIA_TYPE",
            HttpStatusCode::UnprocessableEntity => "UNPROCESSABLE_ENTITY",
            HttpStatusCode::TooManyRequests => "TOO_MANY_REQUESTS",
            HttpStatusCode::InternalServerError => "INTERNAL_SERVER_ERROR",
            HttpStatusCode::NotImplemented => "NOT_IMPLEMENTED",
            HttpStatusCode::BadGateway => "BAD_GATEWAY",
            HttpStatusCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            HttpStatusCode::GatewayTimeout => "GATEWAY_TIMEOUT",
        }
    }

    /// Standard reason phrase, e.g. `Bad Request`
    pub fn reason_phrase(self) -> &'static str {
        match self {
            HttpStatusCode::BadRequest => "Bad Request",
            HttpStatusCode::Unauthorized => "Unauthorized",
            HttpStatusCode::PaymentRequired => "Payment Required",
            HttpStatusCode::Forbidden => "Forbidden",
            HttpStatusCode::NotFound => "Not Found",
            HttpStatusCode::MethodNotAllowed => "Method Not Allowed",
            HttpStatusCode::NotAcceptable => "Not Acceptable",
            HttpStatusCode::RequestTimeout => "Request Timeout",
            HttpStatusCode::Conflict => "Conflict",
            HttpStatusCode::Gone => "Gone",
            HttpStatusCode::PayloadTooLarge => "Payload Too Large",
            HttpStatusCode::UnsupportedMediaType => "Unsupported Media Type",
            HttpStatusCode::UnprocessableEntity => "Unprocessable Entity",
            HttpStatusCode::TooManyRequests => "Too Many Requests",
            HttpStatusCode::InternalServerError => "Internal Server Error",
            HttpStatusCode::NotImplemented => "Not Implemented",
            HttpStatusCode::BadGateway => "Bad Gateway",
            HttpStatusCode::ServiceUnavailable => "Service Unavailable",
            HttpStatusCode::GatewayTimeout => "Gateway Timeout",
        }
    }

    /// Name of the status-derived built-in kind, e.g. `HTTPBAD_REQUESTError`
    pub fn kind_name(self) -> String {
        format!("HTTP{}Error", self.constant_name())
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|status| status.code() == code)
    }
}

impl fmt::Display for HttpStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.reason_phrase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_ascending_and_unique() {
        let codes: Vec<u16> = HttpStatusCode::ALL.iter().map(|s| s.code()).collect();
        let mut sorted = codes.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(codes, sorted);
    }

    #[test]
    fn test_kind_name() {
        assert_eq!(HttpStatusCode::BadRequest.kind_name(), "HTTPBAD_REQUESTError");
        assert_eq!(HttpStatusCode::from_code(429), Some(HttpStatusCode::TooManyRequests));
        assert_eq!(HttpStatusCode::from_code(418), None);
        assert_eq!(HttpStatusCode::NotFound.to_string(), "404 Not Found");
    }
}
