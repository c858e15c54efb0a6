//! Checkout results.

use common::{Money, TransactionId};
use gateway::GatewayError;

use crate::attempt::{CheckoutAttempt, LineResult};

/// How a checkout attempt ended.
#[derive(Debug)]
pub enum CheckoutOutcome {
    /// The purchase is durable and the cart was cleared.
    Committed(CheckoutReceipt),

    /// The customer declined to confirm; nothing was sent to the data store.
    Declined,

    /// The database transaction was rolled back; the cart is unchanged.
    Failed(CheckoutFailure),
}

impl CheckoutOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, CheckoutOutcome::Committed(_))
    }

    pub fn receipt(&self) -> Option<&CheckoutReceipt> {
        match self {
            CheckoutOutcome::Committed(receipt) => Some(receipt),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&CheckoutFailure> {
        match self {
            CheckoutOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// A committed purchase.
#[derive(Debug)]
pub struct CheckoutReceipt {
    pub transaction_id: TransactionId,
    /// Total returned by `finish_transaction`, tax included.
    pub final_total: Money,
    pub total_fulfilled: u32,
    /// Sum of the per-line amounts before finishing.
    pub total_paid: Money,
    pub lines: Vec<LineResult>,
    /// Set when a line failed and the remaining lines were skipped.
    pub interrupted_by: Option<GatewayError>,
}

impl CheckoutReceipt {
    /// Returns true if fewer units were sold than the cart asked for.
    pub fn is_partial(&self) -> bool {
        self.interrupted_by.is_some() || self.lines.iter().any(LineResult::is_partial)
    }
}

/// Why a checkout attempt was rolled back.
///
/// A gateway call that exceeded its budget is always [`FailureKind::Timeout`],
/// whatever the stage; the timed-out operation is named by the cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Auto-commit could not be disabled or no transaction id was allocated.
    TransactionStart,

    /// No unit was sold, either because every line returned zero or because
    /// the line loop was abandoned before anything sold.
    NothingFulfilled,

    /// `finish_transaction` or `commit` failed after something sold.
    Finalize,

    /// A gateway call did not answer within the call timeout.
    Timeout,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::TransactionStart => "transaction_start",
            FailureKind::NothingFulfilled => "nothing_fulfilled",
            FailureKind::Finalize => "finalize",
            FailureKind::Timeout => "timeout",
        }
    }

    /// Returns the kind reported for a failure at this stage: `Timeout`
    /// when `cause` is a timeout, otherwise the stage itself.
    pub fn with_cause(self, cause: Option<&GatewayError>) -> FailureKind {
        if cause.is_some_and(GatewayError::is_timeout) {
            FailureKind::Timeout
        } else {
            self
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FailureKind::TransactionStart => "checkout could not start",
            FailureKind::NothingFulfilled => "nothing was purchased",
            FailureKind::Finalize => "checkout could not be finalized",
            FailureKind::Timeout => "checkout timed out",
        })
    }
}

/// A checkout attempt that was rolled back.
#[derive(Debug)]
pub struct CheckoutFailure {
    pub kind: FailureKind,
    /// The gateway error that caused the failure. `None` when every line
    /// legitimately sold nothing.
    pub cause: Option<GatewayError>,
    /// Set when the rollback itself failed. Never replaces `cause`.
    pub rollback_error: Option<GatewayError>,
    pub attempt: CheckoutAttempt,
}

impl CheckoutFailure {
    /// Returns true if a gateway call exceeded its time budget.
    pub fn timed_out(&self) -> bool {
        self.cause.as_ref().is_some_and(GatewayError::is_timeout)
    }
}

impl std::fmt::Display for CheckoutFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(cause) = &self.cause {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}
