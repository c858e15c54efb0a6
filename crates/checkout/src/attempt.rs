//! Checkout attempt state.

use common::{Money, ProductId, TransactionId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::CheckoutEvent;
use crate::state::CheckoutState;

/// What the data store sold for one cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineResult {
    pub product_id: ProductId,
    pub product_name: String,
    pub requested_quantity: u32,
    pub unit_price: Money,
    pub fulfilled_quantity: u32,
    pub amount_paid: Money,
}

impl LineResult {
    /// Returns true if fewer units were sold than requested.
    pub fn is_partial(&self) -> bool {
        self.fulfilled_quantity < self.requested_quantity
    }
}

impl std::fmt::Display for LineResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Purchased {}/{} of {}",
            self.fulfilled_quantity, self.requested_quantity, self.product_name
        )
    }
}

/// A checkout attempt rebuilt from its events.
///
/// Tracks the state machine position, the per-line results and the running
/// totals. Every applied event is kept in `history`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutAttempt {
    id: Option<Uuid>,
    state: CheckoutState,
    transaction_id: Option<TransactionId>,
    quoted_total: Money,
    lines: Vec<LineResult>,
    total_fulfilled: u32,
    total_paid: Money,
    final_total: Option<Money>,
    failure_reason: Option<String>,
    history: Vec<CheckoutEvent>,
}

impl CheckoutAttempt {
    /// Applies an event to the attempt.
    pub fn apply(&mut self, event: CheckoutEvent) {
        match &event {
            CheckoutEvent::CheckoutRequested(data) => {
                self.id = Some(data.attempt_id);
                self.quoted_total = data.quoted_total;
                self.state = CheckoutState::AwaitingConfirmation;
            }
            CheckoutEvent::ConfirmationReceived(data) => {
                self.state = if data.confirmed {
                    CheckoutState::TransactionOpen
                } else {
                    CheckoutState::Idle
                };
            }
            CheckoutEvent::TransactionStarted(data) => {
                self.transaction_id = Some(data.transaction_id);
                self.state = CheckoutState::PurchasingLines;
            }
            CheckoutEvent::LinePurchased(data) => {
                self.total_fulfilled += data.fulfilled_quantity;
                self.total_paid += data.amount_paid;
                self.lines.push(LineResult {
                    product_id: data.product_id,
                    product_name: data.product_name.clone(),
                    requested_quantity: data.requested_quantity,
                    unit_price: data.unit_price,
                    fulfilled_quantity: data.fulfilled_quantity,
                    amount_paid: data.amount_paid,
                });
            }
            CheckoutEvent::LineFailed(data) => {
                self.failure_reason = Some(data.error.clone());
            }
            CheckoutEvent::PurchasesCompleted(data) => {
                if data.total_fulfilled > 0 {
                    self.state = CheckoutState::Finalizing;
                }
            }
            CheckoutEvent::TransactionFinished(data) => {
                self.final_total = Some(data.final_total);
            }
            CheckoutEvent::CheckoutCommitted(_) => {
                self.state = CheckoutState::Committed;
            }
            CheckoutEvent::CheckoutRolledBack(data) => {
                self.state = CheckoutState::RolledBack;
                self.failure_reason = Some(data.reason.clone());
            }
        }
        self.history.push(event);
    }
}

// Query methods
impl CheckoutAttempt {
    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    pub fn state(&self) -> CheckoutState {
        self.state
    }

    /// Returns the server-side transaction, once allocated.
    pub fn transaction_id(&self) -> Option<TransactionId> {
        self.transaction_id
    }

    /// Returns the cart total at the guaranteed prices.
    pub fn quoted_total(&self) -> Money {
        self.quoted_total
    }

    /// Returns the results of every line the gateway answered.
    pub fn lines(&self) -> &[LineResult] {
        &self.lines
    }

    /// Returns the units sold across every answered line.
    pub fn total_fulfilled(&self) -> u32 {
        self.total_fulfilled
    }

    /// Returns the sum of the amounts paid, before finishing.
    pub fn total_paid(&self) -> Money {
        self.total_paid
    }

    pub fn final_total(&self) -> Option<Money> {
        self.final_total
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Returns the applied events in order.
    pub fn history(&self) -> &[CheckoutEvent] {
        &self.history
    }

    /// Returns the names of the applied events in order.
    pub fn event_types(&self) -> Vec<&'static str> {
        self.history.iter().map(CheckoutEvent::event_type).collect()
    }
}

#[cfg(test)]
mod tests {
    use gateway::LineFulfillment;

    use super::*;

    fn started() -> CheckoutAttempt {
        let mut attempt = CheckoutAttempt::default();
        attempt.apply(CheckoutEvent::checkout_requested(
            Uuid::new_v4(),
            2,
            Money::from_cents(4400),
        ));
        attempt.apply(CheckoutEvent::confirmation_received(true));
        attempt.apply(CheckoutEvent::transaction_started(TransactionId::new(5)));
        attempt
    }

    fn purchased(
        product_id: i32,
        requested: u32,
        fulfilled: u32,
        paid_cents: i64,
    ) -> CheckoutEvent {
        CheckoutEvent::line_purchased(
            ProductId::new(product_id),
            format!("Product {product_id}"),
            requested,
            Money::from_cents(1100),
            LineFulfillment::new(fulfilled, Money::from_cents(paid_cents)),
        )
    }

    #[test]
    fn test_new_attempt_is_idle() {
        let attempt = CheckoutAttempt::default();
        assert_eq!(attempt.state(), CheckoutState::Idle);
        assert!(attempt.history().is_empty());
    }

    #[test]
    fn test_request_awaits_confirmation() {
        let mut attempt = CheckoutAttempt::default();
        let id = Uuid::new_v4();
        attempt.apply(CheckoutEvent::checkout_requested(id, 1, Money::from_cents(500)));

        assert_eq!(attempt.state(), CheckoutState::AwaitingConfirmation);
        assert_eq!(attempt.id(), Some(id));
        assert_eq!(attempt.quoted_total(), Money::from_cents(500));
    }

    #[test]
    fn test_decline_returns_to_idle() {
        let mut attempt = CheckoutAttempt::default();
        attempt.apply(CheckoutEvent::checkout_requested(
            Uuid::new_v4(),
            1,
            Money::from_cents(500),
        ));
        attempt.apply(CheckoutEvent::confirmation_received(false));

        assert_eq!(attempt.state(), CheckoutState::Idle);
    }

    #[test]
    fn test_lines_accumulate_totals() {
        let mut attempt = started();
        assert_eq!(attempt.state(), CheckoutState::PurchasingLines);
        assert_eq!(attempt.transaction_id(), Some(TransactionId::new(5)));

        attempt.apply(purchased(1, 3, 3, 3200));
        attempt.apply(purchased(2, 2, 1, 1000));

        assert_eq!(attempt.total_fulfilled(), 4);
        assert_eq!(attempt.total_paid(), Money::from_cents(4200));
        assert_eq!(attempt.lines().len(), 2);
        assert!(attempt.lines()[1].is_partial());
        assert_eq!(attempt.lines()[1].to_string(), "Purchased 1/2 of Product 2");
    }

    #[test]
    fn test_nothing_fulfilled_does_not_finalize() {
        let mut attempt = started();
        attempt.apply(purchased(1, 3, 0, 0));
        attempt.apply(CheckoutEvent::purchases_completed(0, Money::zero()));

        assert_eq!(attempt.state(), CheckoutState::PurchasingLines);

        attempt.apply(CheckoutEvent::checkout_rolled_back("nothing was purchased"));
        assert_eq!(attempt.state(), CheckoutState::RolledBack);
        assert_eq!(attempt.failure_reason(), Some("nothing was purchased"));
    }

    #[test]
    fn test_committed_attempt() {
        let mut attempt = started();
        attempt.apply(purchased(1, 3, 3, 3200));
        attempt.apply(CheckoutEvent::purchases_completed(3, Money::from_cents(3200)));
        assert_eq!(attempt.state(), CheckoutState::Finalizing);

        attempt.apply(CheckoutEvent::transaction_finished(Money::from_cents(3200)));
        attempt.apply(CheckoutEvent::checkout_committed());

        assert_eq!(attempt.state(), CheckoutState::Committed);
        assert_eq!(attempt.final_total(), Some(Money::from_cents(3200)));
        assert_eq!(
            attempt.event_types(),
            vec![
                "CheckoutRequested",
                "ConfirmationReceived",
                "TransactionStarted",
                "LinePurchased",
                "PurchasesCompleted",
                "TransactionFinished",
                "CheckoutCommitted"
            ]
        );
    }

    #[test]
    fn test_line_failure_is_recorded() {
        let mut attempt = started();
        attempt.apply(CheckoutEvent::line_failed(ProductId::new(1), "connection reset"));

        assert_eq!(attempt.failure_reason(), Some("connection reset"));
        assert_eq!(attempt.total_fulfilled(), 0);
        assert!(attempt.lines().is_empty());
    }
}
