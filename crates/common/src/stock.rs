//! Warehouse stock lots.

use serde::{Deserialize, Serialize};

use crate::{Money, ProductId};

/// One priced, quantity-bounded batch of a product held at a warehouse.
///
/// Read from a `warehouse_stock` row and discarded once the cart line built
/// from it exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLot {
    /// The product this lot holds.
    pub product_id: ProductId,

    /// Human-readable product name.
    pub product_name: String,

    /// Units still available in this lot.
    pub available_quantity: u32,

    /// Price of one unit from this lot.
    pub unit_price: Money,
}

impl StockLot {
    /// Column header matching the `Display` layout.
    pub const HEADER: &'static str = "        Product Name |    QTY |     Price";

    /// Creates a stock lot.
    pub fn new(
        product_id: impl Into<ProductId>,
        product_name: impl Into<String>,
        available_quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            available_quantity,
            unit_price,
        }
    }

    /// Returns the cost of buying the whole lot.
    pub fn total_value(&self) -> Money {
        self.unit_price.multiply(self.available_quantity)
    }
}

impl std::fmt::Display for StockLot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:>20} | {:>6} | {:>9}",
            self.product_name, self.available_quantity, self.unit_price
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_value() {
        let lot = StockLot::new(1, "Generic ABCD", 5, Money::from_cents(1000));
        assert_eq!(lot.total_value(), Money::from_cents(5000));
    }

    #[test]
    fn test_display_row() {
        let lot = StockLot::new(1, "Widget", 3, Money::from_cents(1250));
        assert_eq!(lot.to_string(), "              Widget |      3 |    $12.50");
        assert_eq!(lot.to_string().len(), StockLot::HEADER.len());
    }
}
