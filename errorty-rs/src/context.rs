//! # Dispatch Context
//!
//! The per-request view the host framework hands to the dispatcher. It is
//! read-only during dispatch and dropped afterwards.

use std::collections::BTreeMap;
use std::fmt;
use serde::{Serialize, Deserialize};
use serde_json::{Map, Value};

use crate::sanitization::{sanitize_headers, sanitize_json};

/// Request details available while an error is being dispatched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchContext {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub query: Map<String, Value>,
}

impl DispatchContext {
    pub fn new<M, P>(method: M, path: P) -> Self
    where
        M: Into<String>,
        P: Into<String>,
    {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Adds a header; names are stored lowercase
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        self.headers.insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn body<B: Serialize>(mut self, body: B) -> Self {
        if let Ok(value) = serde_json::to_value(body) {
            self.body = value;
        }
        self
    }

    /// Adds a route parameter
    pub fn param<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Serialize,
    {
        if let Ok(value) = serde_json::to_value(value) {
            self.params.insert(key.into(), value);
        }
        self
    }

    /// Adds a query-string value
    pub fn query<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Serialize,
    {
        if let Ok(value) = serde_json::to_value(value) {
            self.query.insert(key.into(), value);
        }
        self
    }

    /// Full request detail for logging, with credentials redacted
    pub fn log_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("path".to_string(), Value::String(self.path.clone()));
        fields.insert("method".to_string(), Value::String(self.method.clone()));
        fields.insert("body".to_string(), sanitize_json(&self.body));
        fields.insert("params".to_string(), sanitize_json(&Value::Object(self.params.clone())));
        fields.insert("query".to_string(), sanitize_json(&Value::Object(self.query.clone())));
        fields.insert("headers".to_string(), Value::Object(sanitize_headers(&self.headers)));
        fields
    }
}

impl fmt::Display for DispatchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}
