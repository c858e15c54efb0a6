//! Cart error types.

use common::ProductId;
use gateway::GatewayError;
use thiserror::Error;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// A cart line must hold between one unit and the available maximum.
    #[error("Invalid quantity: {quantity} (must be between 1 and {max})")]
    InvalidQuantity { quantity: u32, max: u32 },

    /// More units were requested than the warehouse can supply.
    #[error("Requested {requested} units but only {available} are available")]
    QuantityExceedsAvailable { requested: u32, available: u32 },

    /// The product has no line in the cart.
    #[error("Item not found: product {product_id}")]
    ItemNotFound { product_id: ProductId },

    /// Stock lookup failed.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}
