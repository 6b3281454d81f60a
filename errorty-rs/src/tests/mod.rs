//! Cross-module tests for the registry lifecycle and the dispatch flow.

use once_cell::sync::Lazy;

pub mod dispatch_flow_tests;

// Serialises tests that replace the process-wide registry
pub(crate) static GLOBAL_REGISTRY_LOCK: Lazy<tokio::sync::Mutex<()>> =
    Lazy::new(|| tokio::sync::Mutex::new(()));
