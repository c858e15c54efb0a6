//! Stock availability and guaranteed pricing.
//!
//! Cheaper lots sell first, so the price quoted before purchase is the mean
//! of the eligible lot prices rounded up to the cent. What each unit finally
//! costs is decided by the purchase procedure at checkout.

use common::{Money, ProductId, StockLot};
use gateway::StockQuery;
use rust_decimal::Decimal;

use crate::cart::Cart;
use crate::error::CartError;
use crate::item::CartItem;

/// Number of lots shown by default before asking for a quantity.
pub const DEFAULT_PREVIEW_LIMIT: usize = 5;

/// The stock of one product at lookup time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Availability {
    product_id: ProductId,
    product_name: String,
    lots: Vec<StockLot>,
    total_available: u32,
    guaranteed_price: Money,
}

impl Availability {
    /// Builds availability from a product's lots.
    ///
    /// Lots with nothing left are ignored and the rest are ordered
    /// cheapest-first. Returns `None` when no lot has stock.
    pub fn from_lots(product_id: ProductId, lots: Vec<StockLot>) -> Option<Self> {
        let mut lots: Vec<StockLot> = lots
            .into_iter()
            .filter(|lot| lot.product_id == product_id && lot.available_quantity > 0)
            .collect();
        if lots.is_empty() {
            return None;
        }
        lots.sort_by_key(|lot| lot.unit_price);

        let total_available = lots.iter().map(|lot| lot.available_quantity).sum();
        let price_sum: Money = lots.iter().map(|lot| lot.unit_price).sum();
        let mean = price_sum.amount() / Decimal::from(lots.len());
        let guaranteed_price = Money::new(mean).ceil_to_cent();

        Some(Self {
            product_id,
            product_name: lots[0].product_name.clone(),
            lots,
            total_available,
            guaranteed_price,
        })
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    /// Returns the eligible lots, cheapest first.
    pub fn lots(&self) -> &[StockLot] {
        &self.lots
    }

    /// Returns the units available across every lot.
    pub fn total_available(&self) -> u32 {
        self.total_available
    }

    /// Returns the per-unit price quoted to the customer.
    pub fn guaranteed_price(&self) -> Money {
        self.guaranteed_price
    }

    /// Returns at most `limit` of the cheapest lots.
    pub fn preview(&self, limit: usize) -> &[StockLot] {
        &self.lots[..limit.min(self.lots.len())]
    }

    /// Proposes a cart item for `quantity` units at the guaranteed price.
    ///
    /// Zero means the customer cancelled and yields `None`.
    pub fn propose(&self, quantity: u32) -> Result<Option<CartItem>, CartError> {
        if quantity == 0 {
            return Ok(None);
        }
        if quantity > self.total_available {
            return Err(CartError::QuantityExceedsAvailable {
                requested: quantity,
                available: self.total_available,
            });
        }

        CartItem::new(
            self.product_id,
            self.product_name.clone(),
            quantity,
            self.guaranteed_price,
            self.total_available,
        )
        .map(Some)
    }
}

/// What selecting a product leads to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The product already has a cart line; edit it instead.
    InCart(CartItem),

    /// No lot has stock.
    OutOfStock { product_id: ProductId },

    /// Stock exists and a quantity can be requested.
    Available(Availability),
}

/// Looks up stock for products the customer selects.
#[derive(Debug, Clone)]
pub struct AvailabilityResolver<Q> {
    stock: Q,
    preview_limit: usize,
}

impl<Q: StockQuery> AvailabilityResolver<Q> {
    pub fn new(stock: Q) -> Self {
        Self {
            stock,
            preview_limit: DEFAULT_PREVIEW_LIMIT,
        }
    }

    /// Sets how many lots [`Self::preview`] returns.
    pub fn with_preview_limit(mut self, preview_limit: usize) -> Self {
        self.preview_limit = preview_limit;
        self
    }

    pub fn preview_limit(&self) -> usize {
        self.preview_limit
    }

    /// Returns the configured preview of an availability.
    pub fn preview<'a>(&self, availability: &'a Availability) -> &'a [StockLot] {
        availability.preview(self.preview_limit)
    }

    /// Resolves a product selection against the cart and the warehouse.
    ///
    /// A product already in the cart is returned as `InCart` without
    /// querying stock.
    #[tracing::instrument(skip(self, cart))]
    pub async fn resolve(
        &self,
        cart: &Cart,
        product_id: ProductId,
    ) -> Result<Resolution, CartError> {
        if let Some(item) = cart.get(product_id) {
            tracing::debug!(%product_id, "product already in cart");
            return Ok(Resolution::InCart(item.clone()));
        }

        metrics::counter!("availability_lookups_total").increment(1);
        let lots = self.stock.stock_lots(product_id).await?;

        match Availability::from_lots(product_id, lots) {
            Some(availability) => {
                tracing::debug!(
                    %product_id,
                    total_available = availability.total_available(),
                    guaranteed_price = %availability.guaranteed_price(),
                    "stock found"
                );
                Ok(Resolution::Available(availability))
            }
            None => {
                tracing::info!(%product_id, "product out of stock");
                Ok(Resolution::OutOfStock { product_id })
            }
        }
    }
}
