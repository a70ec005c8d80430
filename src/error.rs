//! Error types surfaced to callers at construction and registration time
//!
//! Failures that happen while an event is being dispatched are never returned;
//! they are reported through [`crate::diagnostics`] instead.

use thiserror::Error;

/// Errors returned by filter construction, parsing and registration
#[derive(Debug, Error)]
pub enum LogError {
    #[error("invalid name pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("unknown severity: {0}")]
    UnknownSeverity(String),
    #[error("dispatcher is closed")]
    Closed,
    #[error("invalid value for {key}: {value}")]
    InvalidOverride { key: String, value: String },
}
