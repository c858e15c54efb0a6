//! Checkout error types.

use thiserror::Error;

/// Errors returned before a checkout attempt starts.
///
/// Gateway failures never surface here; they are reported through
/// [`crate::CheckoutOutcome::Failed`].
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Checkout was requested for a cart with no lines.
    #[error("Cannot check out an empty cart")]
    EmptyCart,
}
