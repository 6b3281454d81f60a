//! Deployment environment detection.
//!
//! The registry receives an explicit [`Environment`] value; `from_env` is the
//! only place process environment variables are consulted.

use std::env;
use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};

/// Variable checked first when detecting the environment
pub const ENVIRONMENT_VAR: &str = "APP_ENV";

/// Variable checked when `APP_ENV` is unset
pub const FALLBACK_ENVIRONMENT_VAR: &str = "RUST_ENV";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Test,
    Staging,
    Production,
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

impl Environment {
    /// Loads `.env` if present, then reads `APP_ENV` (or `RUST_ENV`)
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let raw = env::var(ENVIRONMENT_VAR)
            .or_else(|_| env::var(FALLBACK_ENVIRONMENT_VAR))
            .ok();

        match raw {
            Some(value) => value.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %value, "Unrecognised environment name, assuming development");
                Environment::Development
            }),
            None => Environment::default(),
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "staging" => Ok(Environment::Staging),
            "test" | "testing" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            other => Err(format!("unknown environment: {}", other)),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}
