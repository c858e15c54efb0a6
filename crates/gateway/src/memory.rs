//! In-memory gateway for testing.
//!
//! Behaves like the stored procedures it stands in for: purchases consume
//! lots cheapest-first, and the warehouse is checkpointed whenever a
//! database transaction opens so rollback can restore it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use common::{Money, PaymentMethodId, ProductId, StockLot, TransactionId};
use rust_decimal::Decimal;

use crate::{
    GatewayError, LineFulfillment, PurchaseRequest, Result, StockQuery, TransactionGateway,
};

/// A line recorded by `purchase_product`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedLine {
    pub product_id: ProductId,
    pub requested_quantity: u32,
    pub unit_price: Money,
    pub fulfilled_quantity: u32,
    pub amount_paid: Money,
}

/// A server-side transaction as the in-memory store saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTransaction {
    pub transaction_id: TransactionId,
    pub lines: Vec<RecordedLine>,
    pub tax_rate: Option<Decimal>,
    pub payment_method_id: Option<PaymentMethodId>,
    pub final_total: Option<Money>,
}

impl RecordedTransaction {
    fn new(transaction_id: TransactionId) -> Self {
        Self {
            transaction_id,
            lines: Vec::new(),
            tax_rate: None,
            payment_method_id: None,
            final_total: None,
        }
    }

    /// Returns the units sold across every line.
    pub fn total_fulfilled(&self) -> u32 {
        self.lines.iter().map(|l| l.fulfilled_quantity).sum()
    }

    /// Returns true once `finish_transaction` has run.
    pub fn is_finished(&self) -> bool {
        self.final_total.is_some()
    }
}

#[derive(Debug, Default)]
struct Failures {
    set_auto_commit: bool,
    begin: bool,
    purchase: HashSet<ProductId>,
    finish: bool,
    commit: bool,
    rollback: bool,
}

#[derive(Debug, Default)]
struct CallCounts {
    begin: usize,
    purchase: usize,
    finish: usize,
    commit: usize,
    rollback: usize,
}

#[derive(Debug, Default)]
struct Latency {
    every_call: Option<Duration>,
    operations: HashMap<&'static str, Duration>,
    purchases: HashMap<ProductId, Duration>,
}

impl Latency {
    /// The most specific delay configured for a call.
    fn for_call(&self, operation: &'static str, product_id: Option<ProductId>) -> Option<Duration> {
        product_id
            .and_then(|id| self.purchases.get(&id).copied())
            .or_else(|| self.operations.get(operation).copied())
            .or(self.every_call)
    }
}

#[derive(Debug)]
struct InMemoryGatewayState {
    auto_commit: bool,
    lots: BTreeMap<ProductId, Vec<StockLot>>,
    /// Warehouse as of the start of the open database transaction.
    checkpoint: Option<BTreeMap<ProductId, Vec<StockLot>>>,
    /// A rollback was requested but failed; the server discards the open
    /// transaction whenever it ends.
    doomed: bool,
    next_transaction_id: i32,
    pending: Vec<RecordedTransaction>,
    committed: Vec<RecordedTransaction>,
    failures: Failures,
    calls: CallCounts,
    latency: Latency,
}

impl Default for InMemoryGatewayState {
    fn default() -> Self {
        Self {
            auto_commit: true,
            lots: BTreeMap::new(),
            checkpoint: None,
            doomed: false,
            next_transaction_id: 1,
            pending: Vec::new(),
            committed: Vec::new(),
            failures: Failures::default(),
            calls: CallCounts::default(),
            latency: Latency::default(),
        }
    }
}

impl InMemoryGatewayState {
    fn open(&mut self) {
        self.checkpoint = Some(self.lots.clone());
        self.doomed = false;
    }

    fn discard(&mut self) {
        self.pending.clear();
        if let Some(checkpoint) = self.checkpoint.clone() {
            self.lots = checkpoint;
        }
    }

    fn publish(&mut self) {
        if std::mem::take(&mut self.doomed) {
            self.discard();
            return;
        }
        let pending = std::mem::take(&mut self.pending);
        self.committed.extend(pending);
    }

    /// Makes the last write durable when no database transaction is open.
    fn settle(&mut self) {
        if self.auto_commit {
            self.publish();
        }
    }

    fn transaction_mut(&mut self, id: TransactionId) -> Option<&mut RecordedTransaction> {
        self.pending
            .iter_mut()
            .chain(self.committed.iter_mut())
            .find(|t| t.transaction_id == id)
    }

    fn consume(&mut self, product_id: ProductId, quantity: u32) -> LineFulfillment {
        let Some(lots) = self.lots.get_mut(&product_id) else {
            return LineFulfillment::default();
        };

        let mut remaining = quantity;
        let mut paid = Money::zero();
        for lot in lots.iter_mut() {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(lot.available_quantity);
            lot.available_quantity -= take;
            remaining -= take;
            paid += lot.unit_price.multiply(take);
        }
        lots.retain(|lot| lot.available_quantity > 0);

        LineFulfillment::new(quantity - remaining, paid)
    }
}

fn insert_sorted(lots: &mut BTreeMap<ProductId, Vec<StockLot>>, lot: StockLot) {
    let entry = lots.entry(lot.product_id).or_default();
    entry.push(lot);
    entry.sort_by_key(|l| l.unit_price);
}

fn deplete(lots: &mut BTreeMap<ProductId, Vec<StockLot>>, product_id: ProductId, quantity: u32) {
    if let Some(product_lots) = lots.get_mut(&product_id) {
        let mut remaining = quantity;
        for lot in product_lots.iter_mut() {
            let take = remaining.min(lot.available_quantity);
            lot.available_quantity -= take;
            remaining -= take;
        }
        product_lots.retain(|lot| lot.available_quantity > 0);
    }
}

fn rejected(operation: &'static str, reason: impl Into<String>) -> GatewayError {
    GatewayError::Rejected {
        operation,
        reason: reason.into(),
    }
}

/// In-memory warehouse and transaction store for testing.
///
/// Clones share state, so a test can keep a handle for configuring
/// failures and inspecting calls while the code under test owns another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGateway {
    state: Arc<Mutex<InMemoryGatewayState>>,
}

impl InMemoryGateway {
    /// Creates an empty gateway with auto-commit enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a gateway stocked with the given lots.
    pub fn with_stock(lots: impl IntoIterator<Item = StockLot>) -> Self {
        let gateway = Self::new();
        for lot in lots {
            gateway.add_lot(lot);
        }
        gateway
    }

    fn state(&self) -> MutexGuard<'_, InMemoryGatewayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleeps before a call touches any state, so an abandoned call has no
    /// effect.
    async fn delay(&self, operation: &'static str, product_id: Option<ProductId>) {
        let latency = self.state().latency.for_call(operation, product_id);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Adds a lot to the warehouse as committed stock.
    pub fn add_lot(&self, lot: StockLot) {
        let mut state = self.state();
        if let Some(checkpoint) = state.checkpoint.as_mut() {
            insert_sorted(checkpoint, lot.clone());
        }
        insert_sorted(&mut state.lots, lot);
    }

    /// Simulates another session buying `quantity` units of a product and
    /// committing, cheapest lots first.
    pub fn sell_elsewhere(&self, product_id: ProductId, quantity: u32) {
        let mut state = self.state();
        if let Some(checkpoint) = state.checkpoint.as_mut() {
            deplete(checkpoint, product_id, quantity);
        }
        deplete(&mut state.lots, product_id, quantity);
    }

    /// Returns the units currently visible for a product.
    pub fn available_quantity(&self, product_id: ProductId) -> u32 {
        self.state()
            .lots
            .get(&product_id)
            .map(|lots| lots.iter().map(|l| l.available_quantity).sum())
            .unwrap_or(0)
    }

    /// Configures `set_auto_commit` to fail.
    pub fn set_fail_on_set_auto_commit(&self, fail: bool) {
        self.state().failures.set_auto_commit = fail;
    }

    /// Configures `begin_transaction` to fail.
    pub fn set_fail_on_begin(&self, fail: bool) {
        self.state().failures.begin = fail;
    }

    /// Configures `purchase_line` to fail for one product.
    pub fn set_fail_on_purchase(&self, product_id: ProductId, fail: bool) {
        let mut state = self.state();
        if fail {
            state.failures.purchase.insert(product_id);
        } else {
            state.failures.purchase.remove(&product_id);
        }
    }

    /// Configures `finish_transaction` to fail.
    pub fn set_fail_on_finish(&self, fail: bool) {
        self.state().failures.finish = fail;
    }

    /// Configures `commit` to fail.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.state().failures.commit = fail;
    }

    /// Configures `rollback` to fail.
    pub fn set_fail_on_rollback(&self, fail: bool) {
        self.state().failures.rollback = fail;
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state().latency.every_call = latency;
    }

    /// Delays one operation, named as in the trait (`"commit"`,
    /// `"finish_transaction"`, ...), overriding [`set_latency`](Self::set_latency).
    pub fn set_operation_latency(&self, operation: &'static str, latency: Option<Duration>) {
        let mut state = self.state();
        match latency {
            Some(latency) => state.latency.operations.insert(operation, latency),
            None => state.latency.operations.remove(operation),
        };
    }

    /// Delays `purchase_line` for one product only.
    pub fn set_purchase_latency(&self, product_id: ProductId, latency: Option<Duration>) {
        let mut state = self.state();
        match latency {
            Some(latency) => state.latency.purchases.insert(product_id, latency),
            None => state.latency.purchases.remove(&product_id),
        };
    }

    /// Returns how many times `begin_transaction` was called.
    pub fn begin_count(&self) -> usize {
        self.state().calls.begin
    }

    /// Returns how many times `purchase_line` was called.
    pub fn purchase_count(&self) -> usize {
        self.state().calls.purchase
    }

    /// Returns how many times `finish_transaction` was called.
    pub fn finish_count(&self) -> usize {
        self.state().calls.finish
    }

    /// Returns how many times `commit` was called.
    pub fn commit_count(&self) -> usize {
        self.state().calls.commit
    }

    /// Returns how many times `rollback` was called.
    pub fn rollback_count(&self) -> usize {
        self.state().calls.rollback
    }

    /// Returns every durable transaction in allocation order.
    pub fn committed_transactions(&self) -> Vec<RecordedTransaction> {
        self.state().committed.clone()
    }

    /// Returns the transactions written inside the open database transaction.
    pub fn pending_transactions(&self) -> Vec<RecordedTransaction> {
        self.state().pending.clone()
    }
}

#[async_trait]
impl TransactionGateway for InMemoryGateway {
    fn auto_commit(&self) -> bool {
        self.state().auto_commit
    }

    async fn set_auto_commit(&self, enabled: bool) -> Result<()> {
        self.delay("set_auto_commit", None).await;
        let mut state = self.state();

        if state.failures.set_auto_commit {
            return Err(rejected("set_auto_commit", "connection refused"));
        }

        match (state.auto_commit, enabled) {
            (false, true) => {
                state.publish();
                state.checkpoint = None;
                state.auto_commit = true;
            }
            (true, false) => {
                state.auto_commit = false;
                state.open();
            }
            _ => {}
        }
        Ok(())
    }

    async fn begin_transaction(&self) -> Result<TransactionId> {
        self.delay("begin_transaction", None).await;
        let mut state = self.state();
        state.calls.begin += 1;

        if state.failures.begin {
            return Err(rejected("begin_transaction", "transaction table locked"));
        }

        let transaction_id = TransactionId::new(state.next_transaction_id);
        state.next_transaction_id += 1;
        state.pending.push(RecordedTransaction::new(transaction_id));
        state.settle();

        Ok(transaction_id)
    }

    async fn purchase_line(&self, request: &PurchaseRequest) -> Result<LineFulfillment> {
        self.delay("purchase_line", Some(request.product_id)).await;
        let mut state = self.state();
        state.calls.purchase += 1;

        if state.failures.purchase.contains(&request.product_id) {
            return Err(rejected(
                "purchase_line",
                format!("stock for product {} is unavailable", request.product_id),
            ));
        }

        if state.transaction_mut(request.transaction_id).is_none() {
            return Err(rejected(
                "purchase_line",
                format!("unknown transaction {}", request.transaction_id),
            ));
        }

        let fulfillment = state.consume(request.product_id, request.quantity);
        if let Some(transaction) = state.transaction_mut(request.transaction_id) {
            transaction.lines.push(RecordedLine {
                product_id: request.product_id,
                requested_quantity: request.quantity,
                unit_price: request.unit_price,
                fulfilled_quantity: fulfillment.fulfilled_quantity,
                amount_paid: fulfillment.amount_paid,
            });
        }
        state.settle();

        Ok(fulfillment)
    }

    async fn finish_transaction(
        &self,
        transaction_id: TransactionId,
        tax_rate: Decimal,
        payment_method_id: PaymentMethodId,
    ) -> Result<Money> {
        self.delay("finish_transaction", None).await;
        let mut state = self.state();
        state.calls.finish += 1;

        if state.failures.finish {
            return Err(rejected("finish_transaction", "payment method declined"));
        }

        let transaction = state.transaction_mut(transaction_id).ok_or_else(|| {
            rejected(
                "finish_transaction",
                format!("unknown transaction {transaction_id}"),
            )
        })?;

        if transaction.is_finished() {
            return Err(rejected(
                "finish_transaction",
                format!("transaction {transaction_id} is already finished"),
            ));
        }

        let paid: Money = transaction.lines.iter().map(|l| l.amount_paid).sum();
        let final_total = Money::new(paid.amount() * (Decimal::ONE + tax_rate));
        transaction.tax_rate = Some(tax_rate);
        transaction.payment_method_id = Some(payment_method_id);
        transaction.final_total = Some(final_total);
        state.settle();

        Ok(final_total)
    }

    async fn commit(&self) -> Result<()> {
        self.delay("commit", None).await;
        let mut state = self.state();
        state.calls.commit += 1;

        if state.failures.commit {
            return Err(rejected("commit", "serialization failure"));
        }
        if state.auto_commit {
            return Err(GatewayError::AutoCommitEnabled {
                operation: "commit",
            });
        }

        state.publish();
        state.open();
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.delay("rollback", None).await;
        let mut state = self.state();
        state.calls.rollback += 1;

        if state.failures.rollback {
            if !state.auto_commit {
                state.doomed = true;
            }
            return Err(rejected("rollback", "connection reset"));
        }
        if state.auto_commit {
            return Err(GatewayError::AutoCommitEnabled {
                operation: "rollback",
            });
        }

        state.discard();
        state.open();
        Ok(())
    }
}

#[async_trait]
impl StockQuery for InMemoryGateway {
    async fn stock_lots(&self, product_id: ProductId) -> Result<Vec<StockLot>> {
        self.delay("stock_lots", None).await;
        Ok(self
            .state()
            .lots
            .get(&product_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDGET: ProductId = ProductId::new(1);
    const GADGET: ProductId = ProductId::new(2);

    fn stocked() -> InMemoryGateway {
        InMemoryGateway::with_stock([
            StockLot::new(WIDGET, "Widget", 3, Money::from_cents(1200)),
            StockLot::new(WIDGET, "Widget", 5, Money::from_cents(1000)),
            StockLot::new(GADGET, "Gadget", 1, Money::from_cents(2500)),
        ])
    }

    fn request(
        transaction_id: TransactionId,
        product_id: ProductId,
        quantity: u32,
    ) -> PurchaseRequest {
        PurchaseRequest {
            transaction_id,
            product_id,
            quantity,
            unit_price: Money::from_cents(1100),
        }
    }

    #[tokio::test]
    async fn test_stock_lots_are_cheapest_first() {
        let gateway = stocked();
        let lots = gateway.stock_lots(WIDGET).await.unwrap();
        assert_eq!(lots.len(), 2);
        assert_eq!(lots[0].unit_price, Money::from_cents(1000));
        assert_eq!(lots[1].unit_price, Money::from_cents(1200));
    }

    #[tokio::test]
    async fn test_unknown_product_has_no_lots() {
        let gateway = stocked();
        assert!(
            gateway
                .stock_lots(ProductId::new(99))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_purchase_consumes_cheapest_lots_first() {
        let gateway = stocked();
        let tx = gateway.begin_transaction().await.unwrap();

        let result = gateway
            .purchase_line(&request(tx, WIDGET, 6))
            .await
            .unwrap();

        assert_eq!(result.fulfilled_quantity, 6);
        assert_eq!(result.amount_paid, Money::from_cents(5 * 1000 + 1200));
        assert_eq!(gateway.available_quantity(WIDGET), 2);
    }

    #[tokio::test]
    async fn test_purchase_partially_fulfils_when_stock_runs_out() {
        let gateway = stocked();
        let tx = gateway.begin_transaction().await.unwrap();

        let result = gateway
            .purchase_line(&request(tx, GADGET, 4))
            .await
            .unwrap();

        assert_eq!(result.fulfilled_quantity, 1);
        assert_eq!(result.amount_paid, Money::from_cents(2500));
        assert_eq!(gateway.available_quantity(GADGET), 0);
    }

    #[tokio::test]
    async fn test_purchase_against_unknown_transaction_is_rejected() {
        let gateway = stocked();
        let result = gateway
            .purchase_line(&request(TransactionId::new(42), WIDGET, 1))
            .await;
        assert!(matches!(result, Err(GatewayError::Rejected { .. })));
    }

    #[tokio::test]
    async fn test_rollback_restores_stock_and_discards_transaction() {
        let gateway = stocked();
        gateway.set_auto_commit(false).await.unwrap();

        let tx = gateway.begin_transaction().await.unwrap();
        gateway
            .purchase_line(&request(tx, WIDGET, 8))
            .await
            .unwrap();
        assert_eq!(gateway.available_quantity(WIDGET), 0);

        gateway.rollback().await.unwrap();

        assert_eq!(gateway.available_quantity(WIDGET), 8);
        assert!(gateway.pending_transactions().is_empty());
        assert!(gateway.committed_transactions().is_empty());
        assert_eq!(gateway.rollback_count(), 1);
    }

    #[tokio::test]
    async fn test_commit_publishes_finished_transaction() {
        let gateway = stocked();
        gateway.set_auto_commit(false).await.unwrap();

        let tx = gateway.begin_transaction().await.unwrap();
        gateway
            .purchase_line(&request(tx, GADGET, 1))
            .await
            .unwrap();
        let total = gateway
            .finish_transaction(tx, Decimal::new(10, 2), PaymentMethodId::DEFAULT)
            .await
            .unwrap();
        assert_eq!(total, Money::from_cents(2750));
        assert!(gateway.committed_transactions().is_empty());

        gateway.commit().await.unwrap();

        let committed = gateway.committed_transactions();
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].transaction_id, tx);
        assert_eq!(committed[0].total_fulfilled(), 1);
        assert!(committed[0].is_finished());
    }

    #[tokio::test]
    async fn test_enabling_auto_commit_publishes_pending_work() {
        let gateway = stocked();
        gateway.set_auto_commit(false).await.unwrap();
        gateway.begin_transaction().await.unwrap();

        gateway.set_auto_commit(true).await.unwrap();

        assert!(gateway.auto_commit());
        assert_eq!(gateway.committed_transactions().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_requires_auto_commit_disabled() {
        let gateway = stocked();
        let result = gateway.commit().await;
        assert!(matches!(
            result,
            Err(GatewayError::AutoCommitEnabled {
                operation: "commit"
            })
        ));
    }

    #[tokio::test]
    async fn test_sequential_transaction_ids_survive_rollback() {
        let gateway = stocked();
        gateway.set_auto_commit(false).await.unwrap();

        let first = gateway.begin_transaction().await.unwrap();
        gateway.rollback().await.unwrap();
        let second = gateway.begin_transaction().await.unwrap();

        assert_eq!(first, TransactionId::new(1));
        assert_eq!(second, TransactionId::new(2));
    }

    #[tokio::test]
    async fn test_sale_elsewhere_survives_rollback() {
        let gateway = stocked();
        gateway.set_auto_commit(false).await.unwrap();

        gateway.sell_elsewhere(WIDGET, 5);
        gateway.rollback().await.unwrap();

        assert_eq!(gateway.available_quantity(WIDGET), 3);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let gateway = stocked();
        gateway.set_fail_on_begin(true);
        assert!(gateway.begin_transaction().await.is_err());
        assert_eq!(gateway.begin_count(), 1);

        gateway.set_fail_on_begin(false);
        let tx = gateway.begin_transaction().await.unwrap();

        gateway.set_fail_on_purchase(WIDGET, true);
        assert!(
            gateway
                .purchase_line(&request(tx, WIDGET, 1))
                .await
                .is_err()
        );
        assert!(gateway.purchase_line(&request(tx, GADGET, 1)).await.is_ok());

        gateway.set_fail_on_finish(true);
        assert!(
            gateway
                .finish_transaction(tx, Decimal::ZERO, PaymentMethodId::DEFAULT)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_failed_rollback_is_never_published() {
        let gateway = stocked();
        gateway.set_auto_commit(false).await.unwrap();
        let tx = gateway.begin_transaction().await.unwrap();
        gateway
            .purchase_line(&request(tx, GADGET, 1))
            .await
            .unwrap();

        gateway.set_fail_on_rollback(true);
        assert!(gateway.rollback().await.is_err());
        gateway.set_auto_commit(true).await.unwrap();

        assert!(gateway.committed_transactions().is_empty());
        assert_eq!(gateway.available_quantity(GADGET), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_targets_one_operation_or_product() {
        let gateway = stocked();
        gateway.set_auto_commit(false).await.unwrap();
        gateway.set_operation_latency("commit", Some(Duration::from_secs(5)));
        gateway.set_purchase_latency(WIDGET, Some(Duration::from_secs(5)));
        let budget = Duration::from_millis(100);

        let tx = tokio::time::timeout(budget, gateway.begin_transaction())
            .await
            .unwrap()
            .unwrap();
        assert!(
            tokio::time::timeout(budget, gateway.purchase_line(&request(tx, GADGET, 1)))
                .await
                .is_ok()
        );
        assert!(
            tokio::time::timeout(budget, gateway.purchase_line(&request(tx, WIDGET, 1)))
                .await
                .is_err()
        );
        assert!(
            tokio::time::timeout(budget, gateway.commit())
                .await
                .is_err()
        );

        // Abandoned calls never reached the warehouse.
        assert_eq!(gateway.available_quantity(WIDGET), 8);
        assert_eq!(gateway.purchase_count(), 1);
        assert_eq!(gateway.commit_count(), 0);

        gateway.set_operation_latency("commit", None);
        assert!(tokio::time::timeout(budget, gateway.commit()).await.is_ok());
    }
}
