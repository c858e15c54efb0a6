use async_trait::async_trait;
use common::{Money, PaymentMethodId, ProductId, TransactionId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::Result;

/// One cart line submitted to `purchase_product`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    /// Transaction allocated by `begin_transaction`.
    pub transaction_id: TransactionId,
    /// The product to buy.
    pub product_id: ProductId,
    /// Units the customer asked for.
    pub quantity: u32,
    /// The guaranteed unit price quoted to the customer.
    pub unit_price: Money,
}

/// What the data store actually sold for one line.
///
/// `fulfilled_quantity` may be below the requested quantity when other
/// sessions consumed stock in the meantime; zero is a valid answer, not an
/// error. `amount_paid` reflects the real per-lot prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LineFulfillment {
    /// Units sold.
    pub fulfilled_quantity: u32,
    /// Total charged for those units.
    pub amount_paid: Money,
}

impl LineFulfillment {
    /// Creates a fulfillment result.
    pub fn new(fulfilled_quantity: u32, amount_paid: Money) -> Self {
        Self {
            fulfilled_quantity,
            amount_paid,
        }
    }

    /// Returns true if nothing was sold.
    pub fn is_empty(&self) -> bool {
        self.fulfilled_quantity == 0
    }
}

/// The transactional procedure-call boundary driven by checkout.
///
/// Implementations wrap a single connection. While auto-commit is enabled
/// every call is durable on its own; disabling it opens a database
/// transaction that lasts until [`commit`](Self::commit) or
/// [`rollback`](Self::rollback), each of which immediately opens the next
/// one. Re-enabling auto-commit commits whatever is pending.
#[async_trait]
pub trait TransactionGateway: Send + Sync {
    /// Returns the current auto-commit flag of the connection.
    fn auto_commit(&self) -> bool;

    /// Enables or disables auto-commit.
    async fn set_auto_commit(&self, enabled: bool) -> Result<()>;

    /// Allocates a new server-side purchase transaction.
    async fn begin_transaction(&self) -> Result<TransactionId>;

    /// Attempts to fulfil one cart line against current stock.
    async fn purchase_line(&self, request: &PurchaseRequest) -> Result<LineFulfillment>;

    /// Finalizes pricing and tax across every purchased line and returns the
    /// final total.
    async fn finish_transaction(
        &self,
        transaction_id: TransactionId,
        tax_rate: Decimal,
        payment_method_id: PaymentMethodId,
    ) -> Result<Money>;

    /// Commits the open database transaction.
    async fn commit(&self) -> Result<()>;

    /// Rolls back the open database transaction.
    async fn rollback(&self) -> Result<()>;
}
