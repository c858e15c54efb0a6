use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when calling the data store.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A gateway call did not complete within its time budget.
    #[error("Gateway call '{operation}' timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// The data store refused the call.
    #[error("Gateway rejected '{operation}': {reason}")]
    Rejected {
        operation: &'static str,
        reason: String,
    },

    /// Commit and rollback require auto-commit to be disabled first.
    #[error("Cannot {operation} while auto-commit is enabled")]
    AutoCommitEnabled { operation: &'static str },

    /// A value did not fit the column or parameter type it maps to.
    #[error("Value out of range for {field}: {value}")]
    OutOfRange { field: &'static str, value: i64 },
}

impl GatewayError {
    /// Returns true if this error is a call timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, GatewayError::Timeout { .. })
    }
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
