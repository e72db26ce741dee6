//! Exit codes and structured error reporting for the `mapcache` binary.

use serde::Serialize;

use crate::cache::CacheError;

/// Exit codes for the `mapcache` tool.
///
/// - 0: Success
/// - 1: General error (unexpected failure)
/// - 2: The file could not be opened
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: the command completed normally.
    Success = 0,
    /// General error: an unexpected error occurred.
    GeneralError = 1,
    /// Open failed: the cached path could not be opened or stat'ed.
    OpenFailed = 2,
    /// Interrupted: `watch` was stopped with Ctrl+C.
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "MC000",
            Self::GeneralError => "MC001",
            Self::OpenFailed => "MC002",
            Self::Interrupted => "MC130",
        }
    }

    /// Pick the exit code for an application error.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<CacheError>() {
            Some(CacheError::OpenFailed { .. } | CacheError::StatFailed { .. }) => Self::OpenFailed,
            _ => Self::GeneralError,
        }
    }
}

/// Structured error information for `--json-errors` output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "MC002")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message, including context
    pub message: String,
}

impl StructuredError {
    /// Create a structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{:#}", err),
        }
    }
}
