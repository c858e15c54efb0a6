//! Cart-to-checkout transaction protocol.
//!
//! A checkout runs as one database transaction over a
//! [`gateway::TransactionGateway`]:
//! 1. Disable auto-commit and allocate a transaction id
//! 2. Purchase every cart line, accumulating what actually sold
//! 3. If anything sold, finish the transaction and commit
//!
//! Any failure, or a checkout that sold nothing, rolls back. The
//! connection's auto-commit flag is restored on every path.

pub mod attempt;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod outcome;
pub mod scope;
pub mod settings;
pub mod state;
mod timeout;

pub use attempt::{CheckoutAttempt, LineResult};
pub use coordinator::CheckoutCoordinator;
pub use error::CheckoutError;
pub use events::CheckoutEvent;
pub use outcome::{CheckoutFailure, CheckoutOutcome, CheckoutReceipt, FailureKind};
pub use scope::AutoCommitScope;
pub use settings::{CheckoutSettings, DEFAULT_CALL_TIMEOUT};
pub use state::CheckoutState;
