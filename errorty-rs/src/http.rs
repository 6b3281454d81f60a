//! axum integration: send [`DispatchResponse`]s and build
//! [`DispatchContext`]s from incoming requests.

use std::collections::HashMap;
use axum::extract::Query;
use axum::http::header::CONTENT_TYPE;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use crate::context::DispatchContext;
use crate::dispatcher::{DispatchResponse, ErrorDispatcher};

impl IntoResponse for DispatchResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match self.body() {
            Ok(body) => {
                let mut response = (status, body).into_response();
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static(self.content_type()));
                response
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode error response");
                (StatusCode::INTERNAL_SERVER_ERROR, "Error: Internal Server Error").into_response()
            }
        }
    }
}

impl DispatchContext {
    /// Context from request parts; the body is not available here
    pub fn from_parts(parts: &Parts) -> Self {
        Self::from_request_head(&parts.method, &parts.uri, &parts.headers)
    }

    pub fn from_request_head(method: &Method, uri: &Uri, headers: &HeaderMap) -> Self {
        let mut context = DispatchContext::new(method.as_str(), uri.path());

        for (name, value) in headers {
            if let Ok(value) = value.to_str() {
                context = context.header(name.as_str(), value);
            }
        }

        if let Ok(Query(query)) = Query::<HashMap<String, String>>::try_from_uri(uri) {
            for (key, value) in query {
                context = context.query(key, value);
            }
        }

        context
    }
}

/// Router fallback answering unmatched routes through the process-wide registry
pub async fn not_found_fallback(method: Method, uri: Uri, headers: HeaderMap) -> DispatchResponse {
    let context = DispatchContext::from_request_head(&method, &uri, &headers);
    ErrorDispatcher::new().not_found(&context)
}
