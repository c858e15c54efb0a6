//! Data-store boundary for checkout.
//!
//! The storefront never talks SQL directly. Stock lookups go through
//! [`StockQuery`] and the purchase protocol goes through
//! [`TransactionGateway`], whose operations map one-to-one onto the stored
//! procedures living in the database:
//!
//! - `begin_transaction()`
//! - `purchase_product(transaction, product, quantity, unit_price)`
//! - `finish_transaction(transaction, tax_rate, payment_method)`
//!
//! plus the connection-level `commit`, `rollback` and auto-commit controls.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod stock;
pub mod transaction;

pub use error::{GatewayError, Result};
pub use memory::{InMemoryGateway, RecordedLine, RecordedTransaction};
pub use postgres::{PostgresGateway, PostgresStock};
pub use stock::StockQuery;
pub use transaction::{LineFulfillment, PurchaseRequest, TransactionGateway};
