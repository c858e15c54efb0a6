//! Cart commands - requests to change the cart.

use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::item::CartItem;

/// A request to change a cart, executed by [`crate::Cart::apply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CartCommand {
    /// Add an item, or edit the existing line for the same product.
    Add(CartItem),

    /// Set a line's quantity. Zero removes the line.
    Edit { product_id: ProductId, quantity: u32 },

    /// Remove a line.
    Remove { product_id: ProductId },
}

impl CartCommand {
    pub fn add(item: CartItem) -> Self {
        Self::Add(item)
    }

    pub fn edit(product_id: ProductId, quantity: u32) -> Self {
        Self::Edit {
            product_id,
            quantity,
        }
    }

    pub fn remove(product_id: ProductId) -> Self {
        Self::Remove { product_id }
    }

    /// Returns the product the command targets.
    pub fn product_id(&self) -> ProductId {
        match self {
            Self::Add(item) => item.product_id(),
            Self::Edit { product_id, .. } | Self::Remove { product_id } => *product_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use common::Money;

    use super::*;

    #[test]
    fn test_product_id() {
        let item = CartItem::new(4, "Lamp", 1, Money::from_cents(999), 2).unwrap();
        assert_eq!(CartCommand::add(item).product_id(), ProductId::new(4));
        assert_eq!(
            CartCommand::edit(ProductId::new(5), 3).product_id(),
            ProductId::new(5)
        );
        assert_eq!(
            CartCommand::remove(ProductId::new(6)).product_id(),
            ProductId::new(6)
        );
    }

    #[test]
    fn test_command_serialization() {
        let cmd = CartCommand::edit(ProductId::new(2), 7);
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"type\":\"Edit\""));

        let deserialized: CartCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(cmd, deserialized);
    }
}
