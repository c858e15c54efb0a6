//! Checkout state machine.

use serde::{Deserialize, Serialize};

/// The state of a checkout attempt.
///
/// State transitions:
/// ```text
/// Idle ──► AwaitingConfirmation ──┬──► Idle (declined)
///                                 └──► TransactionOpen
///                                           │
///                     PurchasingLines ◄─────┘
///                           │
///                           ├──► Finalizing ──► Committed
///                           │        │
///                           └────────┴──► RolledBack
/// ```
///
/// A failed `begin_transaction` moves `TransactionOpen` straight to
/// `RolledBack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CheckoutState {
    /// No checkout in progress.
    #[default]
    Idle,

    /// Waiting for the customer to confirm the purchase.
    AwaitingConfirmation,

    /// Auto-commit is off and a transaction id is being allocated.
    TransactionOpen,

    /// Cart lines are being purchased.
    PurchasingLines,

    /// At least one unit was sold; finishing and committing.
    Finalizing,

    /// The purchase is durable (terminal state).
    Committed,

    /// The database transaction was abandoned (terminal state).
    RolledBack,
}

impl CheckoutState {
    /// Returns true if the customer's answer is awaited.
    pub fn can_confirm(&self) -> bool {
        matches!(self, CheckoutState::AwaitingConfirmation)
    }

    /// Returns true if cart lines may be submitted.
    pub fn can_purchase(&self) -> bool {
        matches!(self, CheckoutState::PurchasingLines)
    }

    /// Returns true if the transaction may be finished and committed.
    pub fn can_finalize(&self) -> bool {
        matches!(self, CheckoutState::Finalizing)
    }

    /// Returns true while a database transaction is open.
    pub fn can_roll_back(&self) -> bool {
        matches!(
            self,
            CheckoutState::TransactionOpen
                | CheckoutState::PurchasingLines
                | CheckoutState::Finalizing
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckoutState::Committed | CheckoutState::RolledBack)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::Idle => "Idle",
            CheckoutState::AwaitingConfirmation => "AwaitingConfirmation",
            CheckoutState::TransactionOpen => "TransactionOpen",
            CheckoutState::PurchasingLines => "PurchasingLines",
            CheckoutState::Finalizing => "Finalizing",
            CheckoutState::Committed => "Committed",
            CheckoutState::RolledBack => "RolledBack",
        }
    }
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
