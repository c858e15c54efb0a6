//! Shared value types used across the storefront crates.

pub mod money;
pub mod stock;
pub mod types;

pub use money::Money;
pub use stock::StockLot;
pub use types::{PaymentMethodId, ProductId, TransactionId};
