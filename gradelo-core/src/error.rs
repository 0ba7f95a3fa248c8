//! Error types for Gradelo tracking operations
//!
//! Validation errors (`NotInitialized`, `InvalidArgument`,
//! `AlreadyInitialized`, `Config`) are returned synchronously from the
//! tracking call that caused them. `Transport` errors never surface from a
//! tracking call: the dispatcher hands them to the registered failure
//! handler instead.
//!
//! # Example
//!
//! ```rust
//! use gradelo_core::error::{ErrorCategory, TrackerError};
//!
//! fn handle_error(err: TrackerError) {
//!     match err.category() {
//!         ErrorCategory::Usage => eprintln!("fix the call site: {}", err),
//!         ErrorCategory::Delivery => eprintln!("hit dropped: {}", err),
//!         ErrorCategory::Internal => eprintln!("internal: {}", err),
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for tracking operations
pub type TrackerResult<T> = std::result::Result<T, TrackerError>;

/// Error category for grouping related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The host used the API incorrectly
    Usage,
    /// A hit could not be delivered to the collector
    Delivery,
    /// Storage, encoding or runtime problems
    Internal,
}

/// Errors that can occur in the tracking client
#[derive(Error, Debug)]
pub enum TrackerError {
    // ═══════════════════════════════════════════════════════════════════════
    // Lifecycle errors
    // ═══════════════════════════════════════════════════════════════════════

    /// A tracking operation was called before `initialize`
    #[error("Tracker not initialized. Call initialize() with an app id first.")]
    NotInitialized,

    /// `initialize` was called a second time
    #[error("Tracker already initialized. Re-initialization is not supported.")]
    AlreadyInitialized,

    // ═══════════════════════════════════════════════════════════════════════
    // Validation errors
    // ═══════════════════════════════════════════════════════════════════════

    /// A required string argument was empty
    #[error("Invalid argument '{name}': must not be empty")]
    InvalidArgument { name: &'static str },

    /// Configuration is malformed
    #[error("Invalid configuration: {0}")]
    Config(String),

    // ═══════════════════════════════════════════════════════════════════════
    // Request building and delivery
    // ═══════════════════════════════════════════════════════════════════════

    /// Parameters or endpoint could not be encoded into a request
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The transport failed to deliver a hit
    #[error("Transport error: {0}")]
    Transport(String),

    // ═══════════════════════════════════════════════════════════════════════
    // Internal errors
    // ═══════════════════════════════════════════════════════════════════════

    /// Key-value storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// No async runtime available for the dispatcher
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl TrackerError {
    /// Stable error code for programmatic handling and log aggregation
    pub fn code(&self) -> &'static str {
        match self {
            TrackerError::NotInitialized => "NOT_INITIALIZED",
            TrackerError::AlreadyInitialized => "ALREADY_INITIALIZED",
            TrackerError::InvalidArgument { .. } => "INVALID_ARGUMENT",
            TrackerError::Config(_) => "CONFIG_ERROR",
            TrackerError::Encoding(_) => "ENCODING_ERROR",
            TrackerError::Transport(_) => "TRANSPORT_ERROR",
            TrackerError::Storage(_) => "STORAGE_ERROR",
            TrackerError::Runtime(_) => "RUNTIME_ERROR",
            TrackerError::Serialization(_) => "SERIALIZATION_ERROR",
            TrackerError::Io(_) => "IO_ERROR",
            TrackerError::Url(_) => "INVALID_URL",
        }
    }

    /// Category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            TrackerError::NotInitialized
            | TrackerError::AlreadyInitialized
            | TrackerError::InvalidArgument { .. }
            | TrackerError::Config(_)
            | TrackerError::Url(_) => ErrorCategory::Usage,

            TrackerError::Transport(_) => ErrorCategory::Delivery,

            TrackerError::Encoding(_)
            | TrackerError::Storage(_)
            | TrackerError::Runtime(_)
            | TrackerError::Serialization(_)
            | TrackerError::Io(_) => ErrorCategory::Internal,
        }
    }

    /// Returns true if this error was caused by how the API was called
    pub fn is_usage_error(&self) -> bool {
        self.category() == ErrorCategory::Usage
    }
}
