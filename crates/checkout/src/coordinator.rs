//! Checkout coordinator driving the begin/purchase/finish protocol.

use std::time::Instant;

use cart::Cart;
use gateway::{GatewayError, PurchaseRequest, TransactionGateway};
use uuid::Uuid;

use crate::attempt::CheckoutAttempt;
use crate::error::CheckoutError;
use crate::events::CheckoutEvent;
use crate::outcome::{CheckoutFailure, CheckoutOutcome, CheckoutReceipt, FailureKind};
use crate::scope::AutoCommitScope;
use crate::settings::CheckoutSettings;
use crate::timeout::bounded;

/// Turns a cart into a durable purchase.
///
/// One attempt runs inside one database transaction: auto-commit is
/// disabled, a server-side transaction is allocated, every cart line is
/// purchased in cart order, and the transaction is finished and committed
/// only if at least one unit sold. Anything else rolls back. Auto-commit is
/// restored before `checkout` returns, on every path.
pub struct CheckoutCoordinator<G>
where
    G: TransactionGateway,
{
    gateway: G,
    settings: CheckoutSettings,
}

impl<G> CheckoutCoordinator<G>
where
    G: TransactionGateway,
{
    /// Creates a coordinator with default settings.
    pub fn new(gateway: G) -> Self {
        Self::with_settings(gateway, CheckoutSettings::default())
    }

    pub fn with_settings(gateway: G, settings: CheckoutSettings) -> Self {
        Self { gateway, settings }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn settings(&self) -> &CheckoutSettings {
        &self.settings
    }

    /// Checks out the cart.
    ///
    /// `confirm` is asked once before anything reaches the data store;
    /// returning false yields [`CheckoutOutcome::Declined`]. On commit the
    /// cart is cleared; on every other outcome it is left untouched so the
    /// customer can edit and retry.
    ///
    /// Returns an error only when the cart is empty.
    #[tracing::instrument(skip(self, cart, confirm), fields(lines = cart.product_count()))]
    pub async fn checkout<F>(
        &self,
        cart: &mut Cart,
        confirm: F,
    ) -> Result<CheckoutOutcome, CheckoutError>
    where
        F: FnOnce(&Cart) -> bool,
    {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let mut attempt = CheckoutAttempt::default();
        attempt.apply(CheckoutEvent::checkout_requested(
            Uuid::new_v4(),
            cart.product_count(),
            cart.total_price(),
        ));

        let confirmed = confirm(&*cart);
        attempt.apply(CheckoutEvent::confirmation_received(confirmed));
        if !confirmed {
            tracing::info!("checkout declined");
            return Ok(CheckoutOutcome::Declined);
        }

        metrics::counter!("checkout_attempts_total").increment(1);
        let started = Instant::now();

        let outcome = match AutoCommitScope::acquire(&self.gateway, self.settings.call_timeout)
            .await
        {
            Ok(mut scope) => {
                let outcome = self.run(cart, &mut scope, attempt).await;
                if let Err(error) = scope.release().await {
                    tracing::error!(%error, "failed to restore auto-commit");
                }
                outcome
            }
            Err(cause) => {
                // The scope already undid anything a partial acquire opened.
                tracing::error!(error = %cause, "could not disable auto-commit");
                attempt.apply(CheckoutEvent::checkout_rolled_back(cause.to_string()));
                Self::failed(FailureKind::TransactionStart, Some(cause), None, attempt)
            }
        };

        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());

        match &outcome {
            CheckoutOutcome::Committed(receipt) => {
                metrics::counter!("checkout_committed_total").increment(1);
                tracing::info!(
                    transaction_id = %receipt.transaction_id,
                    total_fulfilled = receipt.total_fulfilled,
                    final_total = %receipt.final_total,
                    "checkout committed"
                );
                cart.clear();
            }
            CheckoutOutcome::Failed(failure) => {
                metrics::counter!("checkout_rolled_back_total", "kind" => failure.kind.as_str())
                    .increment(1);
                tracing::warn!(kind = failure.kind.as_str(), %failure, "checkout rolled back");
            }
            CheckoutOutcome::Declined => {}
        }

        Ok(outcome)
    }

    /// Runs the protocol inside an open database transaction.
    async fn run(
        &self,
        cart: &Cart,
        scope: &mut AutoCommitScope<'_, G>,
        mut attempt: CheckoutAttempt,
    ) -> CheckoutOutcome {
        let timeout = self.settings.call_timeout;

        let transaction_id = match bounded(
            "begin_transaction",
            timeout,
            self.gateway.begin_transaction(),
        )
        .await
        {
            Ok(id) => id,
            Err(cause) => {
                return Self::roll_back(scope, FailureKind::TransactionStart, Some(cause), attempt)
                    .await;
            }
        };
        attempt.apply(CheckoutEvent::transaction_started(transaction_id));
        tracing::debug!(%transaction_id, "transaction started");

        let mut interrupted_by = None;
        for item in cart.items() {
            let request = PurchaseRequest {
                transaction_id,
                product_id: item.product_id(),
                quantity: item.quantity(),
                unit_price: item.unit_price(),
            };

            match bounded("purchase_line", timeout, self.gateway.purchase_line(&request)).await {
                Ok(fulfillment) => {
                    tracing::debug!(
                        product_id = %item.product_id(),
                        requested = item.quantity(),
                        fulfilled = fulfillment.fulfilled_quantity,
                        paid = %fulfillment.amount_paid,
                        "line purchased"
                    );
                    attempt.apply(CheckoutEvent::line_purchased(
                        item.product_id(),
                        item.product_name(),
                        item.quantity(),
                        item.unit_price(),
                        fulfillment,
                    ));
                }
                Err(error) => {
                    tracing::warn!(
                        product_id = %item.product_id(),
                        %error,
                        "line purchase failed, skipping remaining lines"
                    );
                    attempt.apply(CheckoutEvent::line_failed(
                        item.product_id(),
                        error.to_string(),
                    ));
                    interrupted_by = Some(error);
                    break;
                }
            }
        }

        attempt.apply(CheckoutEvent::purchases_completed(
            attempt.total_fulfilled(),
            attempt.total_paid(),
        ));
        if attempt.total_fulfilled() == 0 {
            return Self::roll_back(scope, FailureKind::NothingFulfilled, interrupted_by, attempt)
                .await;
        }

        let final_total = match bounded(
            "finish_transaction",
            timeout,
            self.gateway.finish_transaction(
                transaction_id,
                self.settings.tax_rate,
                self.settings.payment_method_id,
            ),
        )
        .await
        {
            Ok(total) => total,
            Err(cause) => {
                return Self::roll_back(scope, FailureKind::Finalize, Some(cause), attempt).await;
            }
        };
        attempt.apply(CheckoutEvent::transaction_finished(final_total));

        if let Err(cause) = scope.commit().await {
            return Self::roll_back(scope, FailureKind::Finalize, Some(cause), attempt).await;
        }
        attempt.apply(CheckoutEvent::checkout_committed());

        CheckoutOutcome::Committed(CheckoutReceipt {
            transaction_id,
            final_total,
            total_fulfilled: attempt.total_fulfilled(),
            total_paid: attempt.total_paid(),
            lines: attempt.lines().to_vec(),
            interrupted_by,
        })
    }

    /// Rolls back the open transaction. A rollback failure is logged and
    /// recorded next to the original cause, never in place of it.
    async fn roll_back(
        scope: &mut AutoCommitScope<'_, G>,
        kind: FailureKind,
        cause: Option<GatewayError>,
        mut attempt: CheckoutAttempt,
    ) -> CheckoutOutcome {
        let kind = kind.with_cause(cause.as_ref());
        let rollback_error = match scope.rollback().await {
            Ok(()) => None,
            Err(error) => {
                tracing::error!(%error, %kind, "rollback failed");
                Some(error)
            }
        };

        let reason = match &cause {
            Some(cause) => format!("{kind}: {cause}"),
            None => kind.to_string(),
        };
        attempt.apply(CheckoutEvent::checkout_rolled_back(reason));

        Self::failed(kind, cause, rollback_error, attempt)
    }

    fn failed(
        kind: FailureKind,
        cause: Option<GatewayError>,
        rollback_error: Option<GatewayError>,
        attempt: CheckoutAttempt,
    ) -> CheckoutOutcome {
        CheckoutOutcome::Failed(CheckoutFailure {
            kind: kind.with_cause(cause.as_ref()),
            cause,
            rollback_error,
            attempt,
        })
    }
}
