//! # Leveled Logging
//!
//! Severity-gated structured log entries for dispatch events, plus the
//! process-wide `tracing` subscriber setup those entries are emitted through.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Mutex;
use once_cell::sync::OnceCell;
use serde::{Serialize, Deserialize};
use serde_json::{Map, Value};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt as tracing_fmt, layer::SubscriberExt, EnvFilter, Registry};

use crate::types::{Error, Result};

// Flag to track if logging has been initialized
static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

// Keeps the non-blocking file writer flushing for the life of the process
static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Log severities; a lower number is more severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LogLevel::Error,
            1 => LogLevel::Warn,
            2 => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Error => write!(f, "ERROR"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Debug => write!(f, "DEBUG"),
        }
    }
}

/// A plain line or a structured payload with a `message` field
#[derive(Debug, Clone, PartialEq)]
pub enum LogMessage {
    Text(String),
    Structured(Map<String, Value>),
}

impl LogMessage {
    /// Builds a structured payload from a message and metadata
    pub fn structured<S: Into<String>>(message: S, mut meta: Map<String, Value>) -> Self {
        meta.insert("message".to_string(), Value::String(message.into()));
        LogMessage::Structured(meta)
    }
}

impl From<&str> for LogMessage {
    fn from(message: &str) -> Self {
        LogMessage::Text(message.to_string())
    }
}

impl From<String> for LogMessage {
    fn from(message: String) -> Self {
        LogMessage::Text(message)
    }
}

impl From<Map<String, Value>> for LogMessage {
    fn from(payload: Map<String, Value>) -> Self {
        LogMessage::Structured(payload)
    }
}

/// One emitted log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

impl LogEntry {
    /// Builds a timestamped entry, splitting `message` out of structured payloads
    pub fn new(level: LogLevel, message: LogMessage) -> Self {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

        match message {
            LogMessage::Text(message) => Self {
                timestamp,
                level: level.to_string(),
                message,
                meta: None,
            },
            LogMessage::Structured(mut payload) => {
                let message = match payload.remove("message") {
                    Some(Value::String(msg)) => msg,
                    _ => "No message provided".to_string(),
                };
                Self {
                    timestamp,
                    level: level.to_string(),
                    message,
                    meta: Some(payload),
                }
            }
        }
    }
}

/// Logging sink used by the registry and dispatcher
pub trait ErrorLogger: Send + Sync + fmt::Debug {
    /// Records a message at the given severity
    fn log(&self, level: LogLevel, message: LogMessage);

    fn error(&self, message: LogMessage) {
        self.log(LogLevel::Error, message);
    }

    fn warn(&self, message: LogMessage) {
        self.log(LogLevel::Warn, message);
    }

    fn info(&self, message: LogMessage) {
        self.log(LogLevel::Info, message);
    }

    fn debug(&self, message: LogMessage) {
        self.log(LogLevel::Debug, message);
    }

    /// Process-level failures; logged at error severity with a `fatal` marker
    fn fatal(&self, message: LogMessage) {
        let mut payload = match message {
            LogMessage::Text(text) => {
                let mut meta = Map::new();
                meta.insert("message".to_string(), Value::String(text));
                meta
            }
            LogMessage::Structured(payload) => payload,
        };
        payload.insert("fatal".to_string(), Value::Bool(true));
        self.log(LogLevel::Error, LogMessage::Structured(payload));
    }
}

/// Default sink: entries emitted as `tracing` events at the matching level.
/// The entry message becomes the event message; metadata is one `meta` field
/// holding compact JSON.
#[derive(Debug)]
pub struct LeveledLogger {
    threshold: AtomicU8,
}

impl Default for LeveledLogger {
    fn default() -> Self {
        Self::new(LogLevel::default())
    }
}

impl LeveledLogger {
    pub fn new(threshold: LogLevel) -> Self {
        Self {
            threshold: AtomicU8::new(threshold as u8),
        }
    }

    pub fn set_level(&self, level: LogLevel) {
        self.threshold.store(level as u8, Ordering::SeqCst);
    }

    pub fn level(&self) -> LogLevel {
        LogLevel::from_u8(self.threshold.load(Ordering::SeqCst))
    }

    /// True when a call at `level` passes the threshold
    pub fn enabled(&self, level: LogLevel) -> bool {
        level <= self.level()
    }
}

impl ErrorLogger for LeveledLogger {
    fn log(&self, level: LogLevel, message: LogMessage) {
        if !self.enabled(level) {
            return;
        }

        let entry = LogEntry::new(level, message);
        let meta = entry.meta.as_ref().map(|meta| Value::Object(meta.clone()).to_string());

        macro_rules! emit {
            ($event:ident) => {
                match &meta {
                    Some(meta) => tracing::$event!(
                        target: "errorty",
                        logged_at = %entry.timestamp,
                        meta = %meta,
                        "{}",
                        entry.message
                    ),
                    None => tracing::$event!(target: "errorty", logged_at = %entry.timestamp, "{}", entry.message),
                }
            };
        }

        match level {
            LogLevel::Error => emit!(error),
            LogLevel::Warn => emit!(warn),
            LogLevel::Info => emit!(info),
            LogLevel::Debug => emit!(debug),
        }
    }
}

/// Keeps entries in memory; handy for host test suites
#[derive(Debug)]
pub struct RecordingLogger {
    threshold: LogLevel,
    entries: Mutex<Vec<LogEntry>>,
}

impl Default for RecordingLogger {
    fn default() -> Self {
        Self::new(LogLevel::Debug)
    }
}

impl RecordingLogger {
    pub fn new(threshold: LogLevel) -> Self {
        Self {
            threshold,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// Entries recorded at exactly `level`
    pub fn entries_at(&self, level: LogLevel) -> Vec<LogEntry> {
        let label = level.to_string();
        self.lock()
            .iter()
            .filter(|entry| entry.level == label)
            .cloned()
            .collect()
    }

    pub fn contains(&self, text: &str) -> bool {
        self.lock().iter().any(|entry| entry.message.contains(text))
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogEntry>> {
        // A panic while holding the lock leaves the Vec intact
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ErrorLogger for RecordingLogger {
    fn log(&self, level: LogLevel, message: LogMessage) {
        if level <= self.threshold {
            self.lock().push(LogEntry::new(level, message));
        }
    }
}

/// Configuration for the logging system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// The log level to use (trace, debug, info, warn, error)
    pub level: String,
    /// The service name used for log file names
    pub service_name: String,
    /// Whether to output logs to a file
    pub file_output: bool,
    /// The directory to store log files in
    pub log_dir: Option<String>,
    /// Whether to use JSON formatting
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            service_name: "errorty".to_string(),
            file_output: false,
            log_dir: None,
            json_format: true,
        }
    }
}

impl TryFrom<config::Config> for LoggingConfig {
    type Error = config::ConfigError;

    fn try_from(cfg: config::Config) -> std::result::Result<Self, Self::Error> {
        let mut base = LoggingConfig::default();

        if let Ok(level) = cfg.get::<String>("logging.level") {
            base.level = level;
        }
        if let Ok(service_name) = cfg.get::<String>("logging.service_name") {
            base.service_name = service_name;
        }
        if let Ok(file_output) = cfg.get::<bool>("logging.file_output") {
            base.file_output = file_output;
        }
        if let Ok(log_dir) = cfg.get::<String>("logging.log_dir") {
            base.log_dir = Some(log_dir);
        }
        if let Ok(json_format) = cfg.get::<bool>("logging.json_format") {
            base.json_format = json_format;
        }

        Ok(base)
    }
}

/// Installs the global `tracing` subscriber; later calls are no-ops
pub fn init_logging(config: Option<LoggingConfig>) -> Result<()> {
    if LOGGING_INITIALIZED.load(Ordering::SeqCst) {
        return Ok(());
    }

    let config = config.unwrap_or_default();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let json_layer = config.json_format.then(|| {
        tracing_fmt::layer()
            .json()
            .flatten_event(true)
            .with_target(true)
    });
    let text_layer = (!config.json_format).then(|| tracing_fmt::layer().with_target(true));

    let file_layer = match (config.file_output, config.log_dir.as_deref()) {
        (true, Some(log_dir)) => {
            let appender = RollingFileAppender::new(
                Rotation::DAILY,
                log_dir,
                format!("{}.log", config.service_name),
            );
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(tracing_fmt::layer().with_writer(writer).with_ansi(false))
        }
        _ => None,
    };

    let subscriber = Registry::default()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Initialization(format!("Failed to set global subscriber: {}", e)))?;

    LOGGING_INITIALIZED.store(true, Ordering::SeqCst);

    tracing::info!(
        service = %config.service_name,
        level = %config.level,
        json = %config.json_format,
        "Structured logging initialized"
    );

    Ok(())
}
