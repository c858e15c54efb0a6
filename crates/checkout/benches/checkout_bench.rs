use cart::{Availability, Cart, CartItem};
use checkout::CheckoutCoordinator;
use common::{Money, ProductId, StockLot};
use criterion::{Criterion, criterion_group, criterion_main};
use gateway::InMemoryGateway;

const PRODUCTS: i32 = 10;

fn warehouse() -> InMemoryGateway {
    InMemoryGateway::with_stock((1..=PRODUCTS).flat_map(|id| {
        [
            StockLot::new(id, format!("Product {id}"), 50, Money::from_cents(1000)),
            StockLot::new(id, format!("Product {id}"), 50, Money::from_cents(1250)),
        ]
    }))
}

fn full_cart() -> Cart {
    let mut cart = Cart::new();
    for id in 1..=PRODUCTS {
        let item = CartItem::new(id, format!("Product {id}"), 3, Money::from_cents(1125), 100)
            .unwrap();
        cart.add_or_merge(item).unwrap();
    }
    cart
}

fn bench_guaranteed_price(c: &mut Criterion) {
    let lots: Vec<StockLot> = (0..20)
        .map(|i| StockLot::new(1, "Widget", 5, Money::from_cents(1000 + i * 7)))
        .collect();

    c.bench_function("cart/availability_from_20_lots", |b| {
        b.iter(|| Availability::from_lots(ProductId::new(1), lots.clone()).unwrap());
    });
}

fn bench_checkout_commit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("checkout/commit_10_lines", |b| {
        b.iter(|| {
            rt.block_on(async {
                let coordinator = CheckoutCoordinator::new(warehouse());
                let mut cart = full_cart();
                let outcome = coordinator.checkout(&mut cart, |_| true).await.unwrap();
                assert!(outcome.is_committed());
            });
        });
    });
}

fn bench_checkout_rollback(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("checkout/rollback_on_finish_failure", |b| {
        b.iter(|| {
            rt.block_on(async {
                let gateway = warehouse();
                gateway.set_fail_on_finish(true);
                let coordinator = CheckoutCoordinator::new(gateway);
                let mut cart = full_cart();
                let outcome = coordinator.checkout(&mut cart, |_| true).await.unwrap();
                assert!(!outcome.is_committed());
            });
        });
    });
}

criterion_group!(
    benches,
    bench_guaranteed_price,
    bench_checkout_commit,
    bench_checkout_rollback
);
criterion_main!(benches);
