//! Error types for the RunAgent SDK

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Canonical error taxonomy, shared verbatim by the server and every SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AuthenticationError,
    PermissionError,
    ConnectionError,
    ValidationError,
    AgentNotFoundLocal,
    AgentNotFoundRemote,
    ArchitectureMissing,
    EntrypointNotFound,
    StreamEntrypoint,
    NonStreamEntrypoint,
    Timeout,
    ExecutionError,
    ServerError,
    UnknownError,
    // Registry and loader codes
    CapacityExceeded,
    AddressInUse,
    AgentExists,
    ConfigMissing,
    ConfigInvalid,
    EntrypointUnresolved,
    EntrypointNotCallable,
    DuplicateTag,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationError => "AUTHENTICATION_ERROR",
            Self::PermissionError => "PERMISSION_ERROR",
            Self::ConnectionError => "CONNECTION_ERROR",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::AgentNotFoundLocal => "AGENT_NOT_FOUND_LOCAL",
            Self::AgentNotFoundRemote => "AGENT_NOT_FOUND_REMOTE",
            Self::ArchitectureMissing => "ARCHITECTURE_MISSING",
            Self::EntrypointNotFound => "ENTRYPOINT_NOT_FOUND",
            Self::StreamEntrypoint => "STREAM_ENTRYPOINT",
            Self::NonStreamEntrypoint => "NON_STREAM_ENTRYPOINT",
            Self::Timeout => "TIMEOUT",
            Self::ExecutionError => "EXECUTION_ERROR",
            Self::ServerError => "SERVER_ERROR",
            Self::UnknownError => "UNKNOWN_ERROR",
            Self::CapacityExceeded => "CAPACITY_EXCEEDED",
            Self::AddressInUse => "ADDRESS_IN_USE",
            Self::AgentExists => "AGENT_EXISTS",
            Self::ConfigMissing => "CONFIG_MISSING",
            Self::ConfigInvalid => "CONFIG_INVALID",
            Self::EntrypointUnresolved => "ENTRYPOINT_UNRESOLVED",
            Self::EntrypointNotCallable => "ENTRYPOINT_NOT_CALLABLE",
            Self::DuplicateTag => "DUPLICATE_TAG",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error payload carried in envelopes and stream frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBlock {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default)]
    pub suggestion: Option<String>,
    #[serde(default)]
    pub details: Option<Value>,
}

impl ErrorBlock {
    pub fn new<S: Into<String>>(code: ErrorCode, message: S) -> Self {
        Self {
            code,
            message: message.into(),
            suggestion: None,
            details: None,
        }
    }

    pub fn with_suggestion<S: Into<String>>(mut self, suggestion: S) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl fmt::Display for ErrorBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Main error type for the RunAgent SDK
#[derive(Error, Debug)]
pub enum RunAgentError {
    /// Authentication and authorization errors
    #[error("Authentication error: {message}")]
    Authentication { message: String },

    /// Input validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Network and connection errors
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Server-side errors
    #[error("Server error: {message}")]
    Server { message: String },

    /// Database-related errors
    #[error("Database error: {message}")]
    Database { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Invocation errors with the full structured taxonomy payload
    #[error("{code}: {message}")]
    Execution {
        code: ErrorCode,
        message: String,
        suggestion: Option<String>,
        details: Option<Value>,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic error with context
    #[error("RunAgent error: {message}")]
    Generic { message: String },
}

impl RunAgentError {
    /// Create a new authentication error
    pub fn authentication<S: Into<String>>(message: S) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new connection error
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a new server error
    pub fn server<S: Into<String>>(message: S) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    /// Create a new database error
    pub fn database<S: Into<String>>(message: S) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new execution error with structured metadata
    pub fn execution<S: Into<String>>(
        code: ErrorCode,
        message: S,
        suggestion: Option<String>,
        details: Option<Value>,
    ) -> Self {
        Self::Execution {
            code,
            message: message.into(),
            suggestion,
            details,
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Re-raise a wire-level error block as a structured error, fields verbatim
    pub fn from_block(block: ErrorBlock) -> Self {
        Self::Execution {
            code: block.code,
            message: block.message,
            suggestion: block.suggestion,
            details: block.details,
        }
    }

    /// The taxonomy code this error maps to on the wire
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Authentication { .. } => ErrorCode::AuthenticationError,
            Self::Validation { .. } => ErrorCode::ValidationError,
            Self::Connection { .. } => ErrorCode::ConnectionError,
            Self::Server { .. } => ErrorCode::ServerError,
            Self::Database { .. } => ErrorCode::ServerError,
            Self::Config { .. } => ErrorCode::ValidationError,
            Self::Execution { code, .. } => *code,
            Self::Io(_) => ErrorCode::ServerError,
            Self::Json(_) => ErrorCode::ValidationError,
            Self::Http(_) => ErrorCode::ConnectionError,
            Self::Generic { .. } => ErrorCode::UnknownError,
        }
    }

    /// Convert to the wire-level error block
    pub fn error_block(&self) -> ErrorBlock {
        match self {
            Self::Execution {
                code,
                message,
                suggestion,
                details,
            } => ErrorBlock {
                code: *code,
                message: message.clone(),
                suggestion: suggestion.clone(),
                details: details.clone(),
            },
            other => ErrorBlock::new(other.code(), other.to_string()),
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::Authentication { .. } => "authentication",
            Self::Validation { .. } => "validation",
            Self::Connection { .. } => "connection",
            Self::Server { .. } => "server",
            Self::Database { .. } => "database",
            Self::Config { .. } => "config",
            Self::Execution { .. } => "execution",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Http(_) => "http",
            Self::Generic { .. } => "generic",
        }
    }

    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Server { .. } | Self::Http(_)
        ) || matches!(
            self,
            Self::Execution { code, .. }
                if *code == ErrorCode::ConnectionError || *code == ErrorCode::ServerError
        )
    }
}

/// Result type alias for RunAgent operations
pub type RunAgentResult<T> = Result<T, RunAgentError>;
