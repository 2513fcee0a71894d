//! Tool invocation error type.
//!
//! Invokers report failures as a [`ToolError`] carrying a [`ToolErrorCode`].
//! The execution engine retries every code under the step's retry policy;
//! codes only drive diagnostics and telemetry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable failure class reported by an invoker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolErrorCode {
    /// The tool rejected its input
    InvalidArgument,
    /// Unknown tool, endpoint or resource
    NotFound,
    /// Credential rejected by the tool
    PermissionDenied,
    /// Runtime failure inside the tool
    ExecutionFailed,
    /// Transport or endpoint failure
    Unavailable,
    /// The tool gave up on its own deadline
    Timeout,
}

impl ToolErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ToolErrorCode::NotFound => "NOT_FOUND",
            ToolErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ToolErrorCode::ExecutionFailed => "EXECUTION_FAILED",
            ToolErrorCode::Unavailable => "UNAVAILABLE",
            ToolErrorCode::Timeout => "TIMEOUT",
        }
    }

    /// Classify a non-success HTTP status returned by a remote tool.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            401 | 403 => ToolErrorCode::PermissionDenied,
            404 => ToolErrorCode::NotFound,
            400 | 422 => ToolErrorCode::InvalidArgument,
            408 | 504 => ToolErrorCode::Timeout,
            s if s >= 500 => ToolErrorCode::Unavailable,
            _ => ToolErrorCode::ExecutionFailed,
        }
    }
}

impl fmt::Display for ToolErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolError {
    pub code: ToolErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ToolError {
    pub fn new(code: ToolErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn not_found(what: impl fmt::Display) -> Self {
        Self::new(ToolErrorCode::NotFound, format!("{} not found", what))
    }

    pub fn permission_denied(tool: impl fmt::Display) -> Self {
        Self::new(ToolErrorCode::PermissionDenied, format!("{} refused the credential", tool))
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ToolErrorCode::InvalidArgument, message)
    }

    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self::new(ToolErrorCode::ExecutionFailed, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ToolErrorCode::Unavailable, message)
    }

    /// Error for a remote tool that answered with a non-success status.
    pub fn from_http_status(tool: impl fmt::Display, status: u16, body: impl Into<String>) -> Self {
        Self::new(
            ToolErrorCode::from_http_status(status),
            format!("{} answered HTTP {}", tool, status),
        )
        .with_details(body)
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for ToolError {}
