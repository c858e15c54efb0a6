use async_trait::async_trait;
use common::{ProductId, StockLot};

use crate::Result;

/// Read access to warehouse stock.
#[async_trait]
pub trait StockQuery: Send + Sync {
    /// Returns every lot still holding units of `product_id`, cheapest first.
    ///
    /// An empty list means the product is out of stock.
    async fn stock_lots(&self, product_id: ProductId) -> Result<Vec<StockLot>>;
}
