//! Checkout events.
//!
//! Each step of an attempt is recorded as an event and folded into a
//! [`crate::CheckoutAttempt`]. Events live in memory for the duration of one
//! checkout; the data store keeps the durable record.

use chrono::{DateTime, Utc};
use common::{Money, ProductId, TransactionId};
use gateway::LineFulfillment;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events that can occur during a checkout attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CheckoutEvent {
    /// Checkout was requested for a non-empty cart.
    CheckoutRequested(CheckoutRequestedData),

    /// The customer answered the confirmation prompt.
    ConfirmationReceived(ConfirmationData),

    /// `begin_transaction` allocated a transaction id.
    TransactionStarted(TransactionStartedData),

    /// `purchase_line` answered for one cart line.
    LinePurchased(LinePurchasedData),

    /// `purchase_line` failed; remaining lines are skipped.
    LineFailed(LineFailedData),

    /// Every line was submitted, or the loop was abandoned.
    PurchasesCompleted(PurchasesCompletedData),

    /// `finish_transaction` returned the final total.
    TransactionFinished(TransactionFinishedData),

    /// The database transaction was committed.
    CheckoutCommitted(CheckoutCommittedData),

    /// The database transaction was abandoned.
    CheckoutRolledBack(CheckoutRolledBackData),
}

impl CheckoutEvent {
    /// Returns the event name.
    pub fn event_type(&self) -> &'static str {
        match self {
            CheckoutEvent::CheckoutRequested(_) => "CheckoutRequested",
            CheckoutEvent::ConfirmationReceived(_) => "ConfirmationReceived",
            CheckoutEvent::TransactionStarted(_) => "TransactionStarted",
            CheckoutEvent::LinePurchased(_) => "LinePurchased",
            CheckoutEvent::LineFailed(_) => "LineFailed",
            CheckoutEvent::PurchasesCompleted(_) => "PurchasesCompleted",
            CheckoutEvent::TransactionFinished(_) => "TransactionFinished",
            CheckoutEvent::CheckoutCommitted(_) => "CheckoutCommitted",
            CheckoutEvent::CheckoutRolledBack(_) => "CheckoutRolledBack",
        }
    }
}

/// Data for CheckoutRequested event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequestedData {
    pub attempt_id: Uuid,
    /// Distinct products in the cart.
    pub line_count: usize,
    /// Cart total at the guaranteed prices.
    pub quoted_total: Money,
    pub requested_at: DateTime<Utc>,
}

/// Data for ConfirmationReceived event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationData {
    pub confirmed: bool,
}

/// Data for TransactionStarted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionStartedData {
    pub transaction_id: TransactionId,
    pub started_at: DateTime<Utc>,
}

/// Data for LinePurchased event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinePurchasedData {
    pub product_id: ProductId,
    pub product_name: String,
    pub requested_quantity: u32,
    /// Guaranteed price submitted with the line.
    pub unit_price: Money,
    pub fulfilled_quantity: u32,
    pub amount_paid: Money,
}

/// Data for LineFailed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineFailedData {
    pub product_id: ProductId,
    pub error: String,
}

/// Data for PurchasesCompleted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchasesCompletedData {
    pub total_fulfilled: u32,
    pub total_paid: Money,
}

/// Data for TransactionFinished event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionFinishedData {
    pub final_total: Money,
}

/// Data for CheckoutCommitted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutCommittedData {
    pub committed_at: DateTime<Utc>,
}

/// Data for CheckoutRolledBack event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRolledBackData {
    pub reason: String,
    pub rolled_back_at: DateTime<Utc>,
}

// Convenience constructors
impl CheckoutEvent {
    pub fn checkout_requested(attempt_id: Uuid, line_count: usize, quoted_total: Money) -> Self {
        CheckoutEvent::CheckoutRequested(CheckoutRequestedData {
            attempt_id,
            line_count,
            quoted_total,
            requested_at: Utc::now(),
        })
    }

    pub fn confirmation_received(confirmed: bool) -> Self {
        CheckoutEvent::ConfirmationReceived(ConfirmationData { confirmed })
    }

    pub fn transaction_started(transaction_id: TransactionId) -> Self {
        CheckoutEvent::TransactionStarted(TransactionStartedData {
            transaction_id,
            started_at: Utc::now(),
        })
    }

    pub fn line_purchased(
        product_id: ProductId,
        product_name: impl Into<String>,
        requested_quantity: u32,
        unit_price: Money,
        fulfillment: LineFulfillment,
    ) -> Self {
        CheckoutEvent::LinePurchased(LinePurchasedData {
            product_id,
            product_name: product_name.into(),
            requested_quantity,
            unit_price,
            fulfilled_quantity: fulfillment.fulfilled_quantity,
            amount_paid: fulfillment.amount_paid,
        })
    }

    pub fn line_failed(product_id: ProductId, error: impl Into<String>) -> Self {
        CheckoutEvent::LineFailed(LineFailedData {
            product_id,
            error: error.into(),
        })
    }

    pub fn purchases_completed(total_fulfilled: u32, total_paid: Money) -> Self {
        CheckoutEvent::PurchasesCompleted(PurchasesCompletedData {
            total_fulfilled,
            total_paid,
        })
    }

    pub fn transaction_finished(final_total: Money) -> Self {
        CheckoutEvent::TransactionFinished(TransactionFinishedData { final_total })
    }

    pub fn checkout_committed() -> Self {
        CheckoutEvent::CheckoutCommitted(CheckoutCommittedData {
            committed_at: Utc::now(),
        })
    }

    pub fn checkout_rolled_back(reason: impl Into<String>) -> Self {
        CheckoutEvent::CheckoutRolledBack(CheckoutRolledBackData {
            reason: reason.into(),
            rolled_back_at: Utc::now(),
        })
    }
}
