use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

use crate::error::CartError;

/// A customer's requested quantity of one product.
///
/// `unit_price` is the guaranteed price quoted when the item was proposed,
/// not necessarily what each unit will cost at checkout. `max_quantity` is
/// the stock that was available at proposal time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    product_id: ProductId,
    product_name: String,
    quantity: u32,
    unit_price: Money,
    max_quantity: u32,
}

impl CartItem {
    /// Column header matching the `Display` layout.
    pub const HEADER: &'static str =
        "        Product Name |    QTY | Unit Price |      Total";

    /// Creates a cart item, rejecting quantities outside `1..=max_quantity`.
    pub fn new(
        product_id: impl Into<ProductId>,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
        max_quantity: u32,
    ) -> Result<Self, CartError> {
        if quantity == 0 || quantity > max_quantity {
            return Err(CartError::InvalidQuantity {
                quantity,
                max: max_quantity,
            });
        }

        Ok(Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            quantity,
            unit_price,
            max_quantity,
        })
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    /// Returns the requested quantity.
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn max_quantity(&self) -> u32 {
        self.max_quantity
    }

    /// Returns quantity × guaranteed unit price.
    pub fn total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }

    /// Callers validate against `max_quantity` first.
    pub(crate) fn set_quantity(&mut self, quantity: u32) {
        self.quantity = quantity;
    }
}

impl std::fmt::Display for CartItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:>20} | {:>6} | {:>10} | {:>10}",
            self.product_name,
            self.quantity,
            self.unit_price,
            self.total()
        )
    }
}
