//! Checkout parameters.

use std::time::Duration;

use common::PaymentMethodId;
use rust_decimal::Decimal;

/// Default time budget for a single gateway call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Parameters passed to every checkout attempt.
///
/// The storefront offers one payment method and no tax yet, so the defaults
/// are a zero tax rate and payment method 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSettings {
    /// Passed to `finish_transaction`; 0.08 means 8%.
    pub tax_rate: Decimal,
    pub payment_method_id: PaymentMethodId,
    /// Upper bound on each gateway call.
    pub call_timeout: Duration,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::ZERO,
            payment_method_id: PaymentMethodId::DEFAULT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

impl CheckoutSettings {
    pub fn with_tax_rate(mut self, tax_rate: Decimal) -> Self {
        self.tax_rate = tax_rate;
        self
    }

    pub fn with_payment_method(mut self, payment_method_id: PaymentMethodId) -> Self {
        self.payment_method_id = payment_method_id;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }
}
