//! Error types for the task runner
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Retry classification used by the poll and update paths
//! - Exit codes for CLI

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for runner operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // IO errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    IoPermission = 202,
    IoNotFound = 203,

    // Connection errors (3xx)
    ConnectionFailed = 300,
    ConnectionTimeout = 301,
    InvalidUrl = 302,

    // Protocol errors (4xx)
    ServerResponse = 400,
    ProtocolMalformed = 401,
    AuthenticationFailed = 403,

    // Execution errors (5xx)
    ExecutionFailed = 500,
    UpdateFailed = 501,
    Panicked = 502,

    // Worker registration errors (6xx)
    InvalidTaskType = 600,
    InvalidCapacity = 601,
    WorkerNotFound = 602,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10,
            200..=299 => 20,
            300..=399 => 30,
            400..=499 => 40,
            500..=599 => 50,
            600..=699 => 60,
            900..=999 => 90,
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for the runner
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// File write error
    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    // ─────────────────────────────────────────────────────────────
    // Connection Errors
    // ─────────────────────────────────────────────────────────────

    /// Transport-level HTTP failure (connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server base URL could not be parsed
    #[error("Invalid server URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    // ─────────────────────────────────────────────────────────────
    // Protocol Errors
    // ─────────────────────────────────────────────────────────────

    /// Server answered with a non-success status
    #[error("Server responded with status {status}: {body}")]
    ServerResponse { status: u16, body: String },

    /// Payload could not be encoded or decoded
    #[error("Malformed payload: {0}")]
    Serialization(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Execution Errors
    // ─────────────────────────────────────────────────────────────

    /// Result submission gave up after all attempts
    #[error("Failed to update task {task_id} after {attempts} attempts: {last_error}")]
    UpdateRetriesExhausted {
        task_id: String,
        attempts: u32,
        last_error: String,
    },

    /// A concurrency unit panicked and was contained
    #[error("{label} panicked: {message}")]
    Panicked { label: String, message: String },

    // ─────────────────────────────────────────────────────────────
    // Worker Registration Errors
    // ─────────────────────────────────────────────────────────────

    /// Task type empty or otherwise unusable
    #[error("Invalid task type: {0:?}")]
    InvalidTaskType(String),

    /// Requested capacity out of range
    #[error("Invalid capacity {capacity} for task type {task_type}: {reason}")]
    InvalidCapacity {
        task_type: String,
        capacity: usize,
        reason: String,
    },

    /// Operation on a task type that was never started
    #[error("No worker registered for task type {0}")]
    WorkerNotFound(String),

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,

            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },
            Error::Toml(_) => ErrorCode::ConfigParseError,

            Error::Http(e) if e.is_timeout() => ErrorCode::ConnectionTimeout,
            Error::Http(_) => ErrorCode::ConnectionFailed,
            Error::InvalidUrl { .. } => ErrorCode::InvalidUrl,

            Error::ServerResponse { status: 401 | 403, .. } => ErrorCode::AuthenticationFailed,
            Error::ServerResponse { .. } => ErrorCode::ServerResponse,
            Error::Serialization(_) => ErrorCode::ProtocolMalformed,

            Error::UpdateRetriesExhausted { .. } => ErrorCode::UpdateFailed,
            Error::Panicked { .. } => ErrorCode::Panicked,

            Error::InvalidTaskType(_) => ErrorCode::InvalidTaskType,
            Error::InvalidCapacity { .. } => ErrorCode::InvalidCapacity,
            Error::WorkerNotFound(_) => ErrorCode::WorkerNotFound,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Check if the error is worth another attempt against the server
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) | Error::Io(_) => true,
            Error::ServerResponse { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Check if the error is fatal (process should exit)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ConfigNotFound { .. }
                | Error::ConfigParse { .. }
                | Error::ConfigValidation { .. }
                | Error::InvalidUrl { .. }
                | Error::Internal(_)
        )
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'taskrunner config init' to create a default configuration file.",
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'taskrunner config validate' to see details.",
            ),
            Error::ConfigValidation { .. } => Some(
                "Review the configuration file and fix the invalid values.",
            ),
            Error::InvalidUrl { .. } => Some(
                "The server URL must be an absolute http:// or https:// URL, e.g. http://localhost:8080/api.",
            ),
            Error::Http(_) => Some(
                "Check your network connection and verify the server URL is correct.",
            ),
            Error::ServerResponse { status: 401 | 403, .. } => Some(
                "Verify the auth token configured under [server].",
            ),
            Error::InvalidCapacity { .. } => Some(
                "Capacity must be at least 1 and not exceed [worker].max_capacity.",
            ),
            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let mut output = format!("\x1b[31mError [{}]\x1b[0m: {}\n", self.code().as_str(), self);

        if let Some(hint) = self.suggestion() {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Error::ConfigNotFound { path: path.into() }
    }

    /// Create a config parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Error::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config validation error
    pub fn config_validation(message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a server response error
    pub fn server_response(status: u16, body: impl Into<String>) -> Self {
        Error::ServerResponse {
            status,
            body: body.into(),
        }
    }

    /// Create an invalid capacity error
    pub fn invalid_capacity(
        task_type: impl Into<String>,
        capacity: usize,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidCapacity {
            task_type: task_type.into(),
            capacity,
            reason: reason.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
