//! Session error types.

use thiserror::Error;

/// Errors that end a customer session.
///
/// Lookup and checkout failures are reported to the customer and the session
/// continues; only terminal I/O failures end it.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Reading from or writing to the terminal failed.
    #[error("Terminal I/O error: {0}")]
    Io(#[from] std::io::Error),
}
