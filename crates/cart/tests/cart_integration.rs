//! Integration tests for resolving products into cart lines.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use cart::{AvailabilityResolver, Cart, CartCommand, CartError, Resolution};
use common::{Money, ProductId, StockLot};
use gateway::{GatewayError, InMemoryGateway, StockQuery};

const WIDGET: ProductId = ProductId::new(1);
const GADGET: ProductId = ProductId::new(2);
const SOLD_OUT: ProductId = ProductId::new(3);

fn warehouse() -> InMemoryGateway {
    InMemoryGateway::with_stock([
        StockLot::new(WIDGET, "Widget", 5, Money::from_cents(1000)),
        StockLot::new(WIDGET, "Widget", 3, Money::from_cents(1200)),
        StockLot::new(GADGET, "Gadget", 1, Money::from_cents(2500)),
    ])
}

/// Stock query that counts lookups.
#[derive(Clone, Default)]
struct CountingStock {
    inner: InMemoryGateway,
    lookups: Arc<AtomicUsize>,
}

impl CountingStock {
    fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StockQuery for CountingStock {
    async fn stock_lots(&self, product_id: ProductId) -> gateway::Result<Vec<StockLot>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.stock_lots(product_id).await
    }
}

/// Stock query whose lookups always fail.
struct BrokenStock;

#[async_trait]
impl StockQuery for BrokenStock {
    async fn stock_lots(&self, _product_id: ProductId) -> gateway::Result<Vec<StockLot>> {
        Err(GatewayError::Rejected {
            operation: "stock_lots",
            reason: "connection reset".to_string(),
        })
    }
}

#[tokio::test]
async fn test_resolve_available_product() {
    let resolver = AvailabilityResolver::new(warehouse());
    let cart = Cart::new();

    let resolution = resolver.resolve(&cart, WIDGET).await.unwrap();

    let Resolution::Available(availability) = resolution else {
        panic!("expected available stock, got {resolution:?}");
    };
    assert_eq!(availability.total_available(), 8);
    assert_eq!(availability.guaranteed_price(), Money::from_cents(1100));
    assert_eq!(availability.product_name(), "Widget");
}

#[tokio::test]
async fn test_resolve_out_of_stock() {
    let resolver = AvailabilityResolver::new(warehouse());

    let resolution = resolver.resolve(&Cart::new(), SOLD_OUT).await.unwrap();

    assert_eq!(
        resolution,
        Resolution::OutOfStock {
            product_id: SOLD_OUT
        }
    );
}

#[tokio::test]
async fn test_product_in_cart_routes_to_edit_without_lookup() {
    let stock = CountingStock {
        inner: warehouse(),
        ..Default::default()
    };
    let resolver = AvailabilityResolver::new(stock.clone());
    let mut cart = Cart::new();

    let Resolution::Available(availability) = resolver.resolve(&cart, WIDGET).await.unwrap()
    else {
        panic!("expected available stock");
    };
    cart.apply(CartCommand::add(availability.propose(2).unwrap().unwrap()))
        .unwrap();
    assert_eq!(stock.lookups(), 1);

    let resolution = resolver.resolve(&cart, WIDGET).await.unwrap();

    let Resolution::InCart(item) = resolution else {
        panic!("expected the existing cart line, got {resolution:?}");
    };
    assert_eq!(item.quantity(), 2);
    assert_eq!(stock.lookups(), 1);

    cart.apply(CartCommand::edit(item.product_id(), 6)).unwrap();
    assert_eq!(cart.product_count(), 1);
    assert_eq!(cart.total_items(), 6);
}

#[tokio::test]
async fn test_stock_depleted_elsewhere_shrinks_next_quote() {
    let gateway = warehouse();
    let resolver = AvailabilityResolver::new(gateway.clone());

    gateway.sell_elsewhere(WIDGET, 5);

    let Resolution::Available(availability) =
        resolver.resolve(&Cart::new(), WIDGET).await.unwrap()
    else {
        panic!("expected available stock");
    };
    assert_eq!(availability.total_available(), 3);
    assert_eq!(availability.guaranteed_price(), Money::from_cents(1200));
}

#[tokio::test]
async fn test_configured_preview_limit() {
    let gateway = InMemoryGateway::with_stock(
        (1..=8).map(|i| StockLot::new(WIDGET, "Widget", 1, Money::from_cents(100 * i))),
    );
    let resolver = AvailabilityResolver::new(gateway).with_preview_limit(3);

    let Resolution::Available(availability) =
        resolver.resolve(&Cart::new(), WIDGET).await.unwrap()
    else {
        panic!("expected available stock");
    };

    let preview = resolver.preview(&availability);
    assert_eq!(preview.len(), 3);
    assert_eq!(preview[0].unit_price, Money::from_cents(100));
    assert_eq!(availability.lots().len(), 8);
}

#[tokio::test]
async fn test_lookup_failure_is_reported() {
    let resolver = AvailabilityResolver::new(BrokenStock);

    let result = resolver.resolve(&Cart::new(), WIDGET).await;

    assert!(matches!(result, Err(CartError::Gateway(_))));
}
