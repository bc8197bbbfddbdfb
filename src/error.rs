//! Error types for the rig manager.
//!
//! Every failure the synchronization loop can observe is a [`RigError`]. Errors carry
//! structured context and classify themselves into the loop's failure taxonomy so the
//! loop can decide between "log and keep going" and "fail safe and exit".
//!
//! ## Error Categories
//!
//! - **Telemetry Errors**: simulator transport failures, refused connections, malformed payloads
//! - **Cache Errors**: the shared key/value store is unreachable or timed out
//! - **Controller Errors**: the LED controller could not be reached or written
//! - **Persistence Errors**: driver or lap record storage failures
//! - **Configuration Errors**: invalid or unreadable configuration
//!
//! ## Failure classes
//!
//! ```rust
//! use simrig::{FailureClass, RigError};
//!
//! let error = RigError::cache_unreachable("get", "session_data", "connection refused");
//! assert_eq!(error.failure_class(), FailureClass::Transient);
//!
//! let error = RigError::malformed("rpm", "missing field");
//! assert_eq!(error.failure_class(), FailureClass::FatalToLoop);
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for rig operations.
pub type Result<T, E = RigError> = std::result::Result<T, E>;

/// How the synchronization loop reacts to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Log and continue with the next tick.
    Transient,
    /// Log, stop the telemetry source and terminate the loop.
    FatalToLoop,
}

/// Main error type for rig operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RigError {
    #[error("Telemetry source failed: {reason}")]
    Telemetry {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Simulator refused telemetry connection: {reason}")]
    TelemetryRefused { reason: String },

    #[error("Telemetry field '{field}' missing or invalid: {details}")]
    MalformedTelemetry { field: String, details: String },

    #[error("Cache {operation} for key '{key}' failed: {reason}")]
    Cache { operation: String, key: String, reason: String },

    #[error("Light controller error: {reason}")]
    Controller {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Persistence {operation} failed: {reason}")]
    Persistence { operation: String, reason: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: i64 },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },
}

impl RigError {
    /// Classify this error for the synchronization loop.
    ///
    /// Cache and light controller failures are survivable: the cache degrades to
    /// absent and the controller is reconnected on the next tick. Anything else is
    /// fatal to the loop.
    pub fn failure_class(&self) -> FailureClass {
        match self {
            RigError::Cache { .. } | RigError::Controller { .. } => FailureClass::Transient,
            _ => FailureClass::FatalToLoop,
        }
    }

    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            RigError::Telemetry { .. } => true,
            RigError::TelemetryRefused { .. } => true,
            RigError::Cache { .. } => true,
            RigError::Controller { .. } => true,
            RigError::Timeout { .. } => true,
            RigError::MalformedTelemetry { .. } => false,
            RigError::Persistence { .. } => false,
            RigError::NotFound { .. } => false,
            RigError::Config { .. } => false,
            RigError::File { .. } => false,
            RigError::Parse { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            RigError::Telemetry { .. } => vec![
                "Ensure the simulator is running",
                "Check the telemetry recording path",
                "Restart the rig manager",
            ],
            RigError::TelemetryRefused { .. } => vec![
                "Ensure the simulator is running",
                "Check that no other process holds the telemetry connection",
            ],
            RigError::MalformedTelemetry { .. } => vec![
                "Check the telemetry source version",
                "Verify recorded frames contain every required field",
            ],
            RigError::Cache { .. } => vec![
                "Ensure the Redis server is running",
                "Check REDIS_HOST and the configured cache URL",
                "Increase cache.timeout_ms on slow networks",
            ],
            RigError::Controller { .. } => vec![
                "Check the light controller is powered and on the network",
                "Verify lights.host and lights.port",
            ],
            RigError::Persistence { .. } => vec![
                "Check the persistence backend is reachable",
                "Verify the driver exists",
            ],
            RigError::NotFound { .. } => vec!["Check the identifier", "Refresh the driver list"],
            RigError::Config { .. } => vec![
                "Check the configuration file syntax",
                "Verify the value ranges in the error message",
            ],
            RigError::File { .. } => vec!["Check file exists and is readable", "Check file permissions"],
            RigError::Parse { .. } => vec![
                "Check data format compatibility",
                "Verify source data integrity",
            ],
            RigError::Timeout { .. } => vec![
                "Increase timeout duration",
                "Check network latency to the backend",
            ],
        }
    }

    /// Helper constructor for telemetry transport failures.
    pub fn telemetry_failed(reason: impl Into<String>) -> Self {
        RigError::Telemetry { reason: reason.into(), source: None }
    }

    /// Helper constructor for telemetry transport failures with source.
    pub fn telemetry_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        RigError::Telemetry { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for a refused simulator connection.
    pub fn telemetry_refused(reason: impl Into<String>) -> Self {
        RigError::TelemetryRefused { reason: reason.into() }
    }

    /// Helper constructor for malformed telemetry payloads.
    pub fn malformed(field: impl Into<String>, details: impl Into<String>) -> Self {
        RigError::MalformedTelemetry { field: field.into(), details: details.into() }
    }

    /// Helper constructor for cache transport failures.
    pub fn cache_unreachable(
        operation: impl Into<String>,
        key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        RigError::Cache { operation: operation.into(), key: key.into(), reason: reason.into() }
    }

    /// Helper constructor for light controller failures.
    pub fn controller_failed(reason: impl Into<String>) -> Self {
        RigError::Controller { reason: reason.into(), source: None }
    }

    /// Helper constructor for light controller failures with source.
    pub fn controller_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        RigError::Controller { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for persistence failures.
    pub fn persistence_failed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        RigError::Persistence { operation: operation.into(), reason: reason.into() }
    }

    /// Helper constructor for missing entities.
    pub fn not_found(entity: impl Into<String>, id: i64) -> Self {
        RigError::NotFound { entity: entity.into(), id }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        RigError::Config { reason: reason.into() }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        RigError::File { path, source }
    }

    /// Helper constructor for parse errors.
    pub fn parse(context: impl Into<String>, details: impl Into<String>) -> Self {
        RigError::Parse { context: context.into(), details: details.into() }
    }

    /// Render the error and its full source chain on one line.
    pub fn chain(&self) -> String {
        let mut rendered = self.to_string();
        let mut current = std::error::Error::source(self);
        while let Some(source) = current {
            rendered.push_str(": ");
            rendered.push_str(&source.to_string());
            current = source.source();
        }
        rendered
    }
}

impl From<std::io::Error> for RigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::ConnectionReset => {
                RigError::TelemetryRefused { reason: err.to_string() }
            }
            _ => RigError::File { path: PathBuf::from("<unknown>"), source: err },
        }
    }
}

impl From<serde_json::Error> for RigError {
    fn from(err: serde_json::Error) -> Self {
        RigError::Parse { context: "JSON".to_string(), details: err.to_string() }
    }
}

impl From<serde_yaml_ng::Error> for RigError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        RigError::Parse { context: "YAML".to_string(), details: err.to_string() }
    }
}
