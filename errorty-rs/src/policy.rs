//! # Policy and Configuration
//!
//! [`ErrortyConfig`] is the configuration surface applied when a registry is
//! initialized or rebuilt; [`Policy`] is the resolved set of toggles the
//! dispatcher reads.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use serde::{Serialize, Deserialize};

use crate::environment::Environment;
use crate::kind::HttpErrorKind;
use crate::loader::KindLoader;
use crate::logger::ErrorLogger;

/// Wire format of error responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseEncoding {
    Json,
    Text,
}

impl Default for ResponseEncoding {
    fn default() -> Self {
        ResponseEncoding::Json
    }
}

impl FromStr for ResponseEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ResponseEncoding::Json),
            "text" => Ok(ResponseEncoding::Text),
            other => Err(format!("unknown response encoding: {}", other)),
        }
    }
}

impl fmt::Display for ResponseEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseEncoding::Json => write!(f, "json"),
            ResponseEncoding::Text => write!(f, "text"),
        }
    }
}

/// Active toggles of a registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Include stack text in error envelopes (never honoured in production)
    pub show_stack_trace: bool,
    /// Log full request context instead of a one-line summary
    pub log_request_details: bool,
    pub response_encoding: ResponseEncoding,
    pub environment: Environment,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            show_stack_trace: false,
            log_request_details: true,
            response_encoding: ResponseEncoding::Json,
            environment: Environment::default(),
        }
    }
}

impl Policy {
    /// Stack traces are exposed only outside production
    pub fn exposes_stack_trace(&self) -> bool {
        self.show_stack_trace && !self.environment.is_production()
    }

    pub fn is_production(&self) -> bool {
        self.environment.is_production()
    }

    /// Overwrites every toggle the config sets
    pub fn apply(&mut self, config: &ErrortyConfig) {
        if let Some(show) = config.show_stack_trace {
            self.show_stack_trace = show;
        }
        if let Some(details) = config.log_request_details {
            self.log_request_details = details;
        }
        if let Some(encoding) = config.response_encoding {
            self.response_encoding = encoding;
        }
        if let Some(environment) = config.environment {
            self.environment = environment;
        }
    }
}

/// Extra kind sources merged after the built-ins
#[derive(Debug, Clone, Default)]
pub struct ErrorOverrides {
    /// Directory handed to the kind loader (asynchronous initialization only)
    pub path: Option<PathBuf>,
    /// Kinds registered verbatim
    pub errors: Vec<HttpErrorKind>,
}

impl ErrorOverrides {
    pub fn path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn error(mut self, kind: HttpErrorKind) -> Self {
        self.errors.push(kind);
        self
    }
}

/// Options applied at initialization or reconfiguration; unset fields keep
/// their current (or default) value
#[derive(Debug, Clone, Default)]
pub struct ErrortyConfig {
    pub logger: Option<Arc<dyn ErrorLogger>>,
    pub show_stack_trace: Option<bool>,
    pub log_request_details: Option<bool>,
    /// Name to status code pairs registered as ad-hoc kinds
    pub custom_error_map: HashMap<String, u16>,
    pub error_overrides: Option<ErrorOverrides>,
    pub response_encoding: Option<ResponseEncoding>,
    pub environment: Option<Environment>,
    /// Reads kind definitions from `error_overrides.path`
    pub kind_loader: Option<Arc<dyn KindLoader>>,
}

impl ErrortyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logger(mut self, logger: Arc<dyn ErrorLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn show_stack_trace(mut self, show: bool) -> Self {
        self.show_stack_trace = Some(show);
        self
    }

    pub fn log_request_details(mut self, details: bool) -> Self {
        self.log_request_details = Some(details);
        self
    }

    pub fn custom_error<N: Into<String>>(mut self, name: N, status_code: u16) -> Self {
        self.custom_error_map.insert(name.into(), status_code);
        self
    }

    pub fn error_overrides(mut self, overrides: ErrorOverrides) -> Self {
        self.error_overrides = Some(overrides);
        self
    }

    pub fn response_encoding(mut self, encoding: ResponseEncoding) -> Self {
        self.response_encoding = Some(encoding);
        self
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn kind_loader(mut self, loader: Arc<dyn KindLoader>) -> Self {
        self.kind_loader = Some(loader);
        self
    }

    /// Layers `overrides` on top of `self`; set fields in `overrides` win and
    /// custom error maps are unioned
    pub fn merged_with(&self, overrides: &ErrortyConfig) -> ErrortyConfig {
        let mut merged = self.clone();

        if overrides.logger.is_some() {
            merged.logger = overrides.logger.clone();
        }
        if overrides.show_stack_trace.is_some() {
            merged.show_stack_trace = overrides.show_stack_trace;
        }
        if overrides.log_request_details.is_some() {
            merged.log_request_details = overrides.log_request_details;
        }
        for (name, status) in &overrides.custom_error_map {
            merged.custom_error_map.insert(name.clone(), *status);
        }
        if overrides.error_overrides.is_some() {
            merged.error_overrides = overrides.error_overrides.clone();
        }
        if overrides.response_encoding.is_some() {
            merged.response_encoding = overrides.response_encoding;
        }
        if overrides.environment.is_some() {
            merged.environment = overrides.environment;
        }
        if overrides.kind_loader.is_some() {
            merged.kind_loader = overrides.kind_loader.clone();
        }

        merged
    }
}

impl TryFrom<config::Config> for ErrortyConfig {
    type Error = config::ConfigError;

    fn try_from(cfg: config::Config) -> std::result::Result<Self, Self::Error> {
        let mut base = ErrortyConfig::default();

        if let Ok(show) = cfg.get::<bool>("errorty.show_stack_trace") {
            base.show_stack_trace = Some(show);
        }
        if let Ok(details) = cfg.get::<bool>("errorty.log_request_details") {
            base.log_request_details = Some(details);
        }
        if let Ok(encoding) = cfg.get::<String>("errorty.response_encoding") {
            base.response_encoding = Some(encoding.parse().map_err(config::ConfigError::Message)?);
        }
        if let Ok(environment) = cfg.get::<String>("errorty.environment") {
            base.environment = Some(environment.parse().map_err(config::ConfigError::Message)?);
        }
        if let Ok(custom) = cfg.get::<HashMap<String, u16>>("errorty.custom_error_map") {
            base.custom_error_map = custom;
        }
        if let Ok(path) = cfg.get::<String>("errorty.error_overrides.path") {
            base.error_overrides = Some(ErrorOverrides::default().path(path));
        }

        Ok(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_trace_suppressed_in_production() {
        let mut policy = Policy {
            show_stack_trace: true,
            ..Default::default()
        };
        assert!(policy.exposes_stack_trace());

        policy.environment = Environment::Production;
        assert!(!policy.exposes_stack_trace());
    }

    #[test]
    fn test_apply_only_overwrites_set_fields() {
        let mut policy = Policy::default();
        policy.apply(&ErrortyConfig::new().response_encoding(ResponseEncoding::Text));

        assert_eq!(policy.response_encoding, ResponseEncoding::Text);
        assert!(policy.log_request_details);
        assert!(!policy.show_stack_trace);
    }

    #[test]
    fn test_merged_with() {
        let base = ErrortyConfig::new()
            .show_stack_trace(true)
            .custom_error("PaymentDeclined", 402);
        let overrides = ErrortyConfig::new()
            .show_stack_trace(false)
            .custom_error("Teapot", 418);

        let merged = base.merged_with(&overrides);
        assert_eq!(merged.show_stack_trace, Some(false));
        assert_eq!(merged.custom_error_map.len(), 2);
        assert_eq!(merged.custom_error_map["Teapot"], 418);
    }

    #[test]
    fn test_from_config_source() {
        let cfg = config::Config::builder()
            .set_override("errorty.show_stack_trace", true)
            .unwrap()
            .set_override("errorty.response_encoding", "text")
            .unwrap()
            .set_override("errorty.environment", "production")
            .unwrap()
            .set_override("errorty.error_overrides.path", "./errors")
            .unwrap()
            .build()
            .unwrap();

        let parsed = ErrortyConfig::try_from(cfg).unwrap();
        assert_eq!(parsed.show_stack_trace, Some(true));
        assert_eq!(parsed.response_encoding, Some(ResponseEncoding::Text));
        assert_eq!(parsed.environment, Some(Environment::Production));
        assert_eq!(parsed.log_request_details, None);
        assert_eq!(
            parsed.error_overrides.unwrap().path,
            Some(PathBuf::from("./errors"))
        );
    }

    #[test]
    fn test_from_config_rejects_bad_encoding() {
        let cfg = config::Config::builder()
            .set_override("errorty.response_encoding", "xml")
            .unwrap()
            .build()
            .unwrap();

        assert!(ErrortyConfig::try_from(cfg).is_err());
    }
}
