//! Shopping cart for the storefront.
//!
//! This crate provides:
//! - `CartItem`, one requested product bound to its guaranteed price
//! - `Cart`, an ordered set of items with at most one line per product
//! - `CartCommand`, the explicit add/edit/remove surface
//! - `AvailabilityResolver`, which turns warehouse stock lots into a price
//!   quote and a cart item proposal

pub mod availability;
pub mod cart;
pub mod commands;
pub mod error;
pub mod item;

pub use availability::{Availability, AvailabilityResolver, DEFAULT_PREVIEW_LIMIT, Resolution};
pub use cart::{Cart, CartChange};
pub use commands::CartCommand;
pub use error::CartError;
pub use item::CartItem;
