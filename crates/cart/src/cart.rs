//! The shopping cart.

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

use crate::commands::CartCommand;
use crate::error::CartError;
use crate::item::CartItem;

/// The effect of a cart mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartChange {
    /// A new line was appended.
    Added { product_id: ProductId },

    /// An existing line changed quantity.
    Updated {
        product_id: ProductId,
        from: u32,
        to: u32,
    },

    /// A line was removed.
    Removed { product_id: ProductId },
}

/// An ordered collection of cart items.
///
/// Insertion order is display order and checkout order. There is at most
/// one item per product; adding a product that is already present edits
/// the existing line instead. Nothing here touches the data store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// Creates an empty cart.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the items in insertion order.
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Returns the line for a product, if present.
    pub fn get(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id() == product_id)
    }

    /// Returns true if the product has a line in the cart.
    pub fn contains(&self, product_id: ProductId) -> bool {
        self.get(product_id).is_some()
    }

    /// Returns true if the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the number of distinct products.
    pub fn product_count(&self) -> usize {
        self.items.len()
    }

    /// Returns the sum of requested quantities.
    pub fn total_items(&self) -> u32 {
        self.items.iter().map(CartItem::quantity).sum()
    }

    /// Returns the sum of quantity × guaranteed price over all lines.
    pub fn total_price(&self) -> Money {
        self.items.iter().map(CartItem::total).sum()
    }

    /// Adds an item, or edits the existing line for the same product to the
    /// item's quantity.
    ///
    /// When the product is already present the edit is validated against the
    /// existing line's maximum.
    pub fn add_or_merge(&mut self, item: CartItem) -> Result<CartChange, CartError> {
        let product_id = item.product_id();
        if self.contains(product_id) {
            return self.edit_quantity(product_id, item.quantity());
        }

        self.items.push(item);
        Ok(CartChange::Added { product_id })
    }

    /// Sets a line's quantity. Zero removes the line; anything above the
    /// line's maximum is rejected and leaves the cart unchanged.
    pub fn edit_quantity(
        &mut self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartChange, CartError> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.product_id() == product_id)
            .ok_or(CartError::ItemNotFound { product_id })?;

        if quantity > item.max_quantity() {
            return Err(CartError::QuantityExceedsAvailable {
                requested: quantity,
                available: item.max_quantity(),
            });
        }

        if quantity == 0 {
            return self.remove(product_id);
        }

        let from = item.quantity();
        item.set_quantity(quantity);
        Ok(CartChange::Updated {
            product_id,
            from,
            to: quantity,
        })
    }

    /// Removes a product's line.
    pub fn remove(&mut self, product_id: ProductId) -> Result<CartChange, CartError> {
        let before = self.items.len();
        self.items.retain(|i| i.product_id() != product_id);

        if self.items.len() == before {
            return Err(CartError::ItemNotFound { product_id });
        }
        Ok(CartChange::Removed { product_id })
    }

    /// Executes a cart command.
    pub fn apply(&mut self, command: CartCommand) -> Result<CartChange, CartError> {
        match command {
            CartCommand::Add(item) => self.add_or_merge(item),
            CartCommand::Edit {
                product_id,
                quantity,
            } => self.edit_quantity(product_id, quantity),
            CartCommand::Remove { product_id } => self.remove(product_id),
        }
    }

    /// Empties the cart.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}
