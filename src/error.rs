//! Error types for replay serving.
//!
//! All errors implement `std::error::Error` and carry enough context to tell
//! the operator what went wrong with a data set or a connection.
//!
//! ## Error Categories
//!
//! - **Catalog Errors**: No frames could be found or extracted for a data set (fatal)
//! - **Timing Errors**: The timing index had to fall back or carry values forward (non-fatal)
//! - **Control Errors**: A viewer sent a message that could not be understood (non-fatal)
//! - **Session Errors**: A send raced with connection close (expected, silent)
//! - **File / Decode / Transport Errors**: I/O, payload decoding and WebSocket failures
//!
//! ## Fatal vs. recoverable
//!
//! ```rust
//! use xviz_replay::ServeError;
//!
//! let error = ServeError::malformed_control("expected a JSON object");
//! assert!(!error.is_fatal());
//!
//! let error = ServeError::catalog_unavailable("/data/run-1", "no frames and no archive");
//! assert!(error.is_fatal());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for replay operations.
pub type Result<T, E = ServeError> = std::result::Result<T, E>;

/// Main error type for replay operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ServeError {
    #[error("Frame catalog unavailable at {path}: {reason}")]
    CatalogUnavailable { path: PathBuf, reason: String },

    #[error("Timing index degraded: {reason}")]
    TimingIndexDegraded { reason: String },

    #[error("Malformed control message: {details}")]
    MalformedControlMessage { details: String },

    #[error("Session {connection_id} is closed")]
    SessionClosed { connection_id: u64 },

    #[error("Frame file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Decode error in {context}: {details}")]
    Decode { context: String, details: String },

    #[error("Transport error: {reason}")]
    Transport {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },
}

impl ServeError {
    /// Returns whether this error prevents any session from being served.
    pub fn is_fatal(&self) -> bool {
        match self {
            ServeError::CatalogUnavailable { .. } => true,
            ServeError::Config { .. } => true,
            ServeError::TimingIndexDegraded { .. } => false,
            ServeError::MalformedControlMessage { .. } => false,
            ServeError::SessionClosed { .. } => false,
            ServeError::File { .. } => false,
            ServeError::Decode { .. } => false,
            ServeError::Transport { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            ServeError::CatalogUnavailable { .. } => vec![
                "Check the data directory path",
                "Ensure frames are named <index>-frame.glb or <index>-frame.json",
                "Provide a frames.tar.gz archive in the data directory",
                "Verify `tar` is installed when serving from an archive",
            ],
            ServeError::TimingIndexDegraded { .. } => vec![
                "Regenerate the 0-frame.json timing index",
                "Check that every frame carries a timestamp",
            ],
            ServeError::MalformedControlMessage { .. } => vec![
                "Send control messages as JSON text frames",
                "Check the message `type` and `data` fields",
            ],
            ServeError::SessionClosed { .. } => vec!["Open a new connection"],
            ServeError::File { .. } => vec![
                "Check file exists and is readable",
                "Check file permissions",
            ],
            ServeError::Decode { .. } => vec![
                "Verify the frame is valid JSON or GLB",
                "Verify source data integrity",
            ],
            ServeError::Transport { .. } => vec![
                "Check the viewer is still connected",
                "Check the port is not already in use",
            ],
            ServeError::Config { .. } => vec![
                "Check command line flags and the config file",
                "Use a send interval greater than zero",
            ],
        }
    }

    /// Helper constructor for an unavailable catalog.
    pub fn catalog_unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ServeError::CatalogUnavailable { path: path.into(), reason: reason.into() }
    }

    /// Helper constructor for timing index degradation.
    pub fn timing_degraded(reason: impl Into<String>) -> Self {
        ServeError::TimingIndexDegraded { reason: reason.into() }
    }

    /// Helper constructor for malformed control messages.
    pub fn malformed_control(details: impl Into<String>) -> Self {
        ServeError::MalformedControlMessage { details: details.into() }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ServeError::File { path: path.into(), source }
    }

    /// Helper constructor for decode errors.
    pub fn decode(context: impl Into<String>, details: impl Into<String>) -> Self {
        ServeError::Decode { context: context.into(), details: details.into() }
    }

    /// Helper constructor for transport errors.
    pub fn transport(reason: impl Into<String>) -> Self {
        ServeError::Transport { reason: reason.into(), source: None }
    }

    /// Helper constructor for transport errors with source.
    pub fn transport_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        ServeError::Transport { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        ServeError::Config { reason: reason.into() }
    }
}

impl From<std::io::Error> for ServeError {
    fn from(err: std::io::Error) -> Self {
        ServeError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}

impl From<serde_json::Error> for ServeError {
    fn from(err: serde_json::Error) -> Self {
        ServeError::Decode { context: "JSON".to_string(), details: err.to_string() }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ServeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ServeError::Transport { reason: "WebSocket failure".to_string(), source: Some(Box::new(err)) }
    }
}
