use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{Money, PaymentMethodId, ProductId, StockLot, TransactionId};
use rust_decimal::Decimal;
use sqlx::{Executor, PgConnection, PgPool, Postgres, Row, pool::PoolConnection, postgres::PgRow};
use tokio::sync::{Mutex, MutexGuard};

use crate::{
    GatewayError, LineFulfillment, PurchaseRequest, Result, StockQuery, TransactionGateway,
};

fn to_i32(field: &'static str, value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| GatewayError::OutOfRange {
        field,
        value: i64::from(value),
    })
}

fn to_u32(field: &'static str, value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| GatewayError::OutOfRange {
        field,
        value: i64::from(value),
    })
}

/// The dedicated connection and whether a `BEGIN` is in effect on it.
struct ConnectionState {
    conn: PoolConnection<Postgres>,
    in_transaction: bool,
}

/// PostgreSQL-backed transaction gateway.
///
/// Holds one pooled connection for its whole lifetime, since the protocol
/// spans several statements inside a single database transaction. The
/// auto-commit flag is emulated: while it is off, every statement runs
/// inside a `BEGIN`. After a commit or rollback the next `BEGIN` is issued
/// lazily by the next statement, so ending a transaction only reports the
/// outcome of `COMMIT` or `ROLLBACK` itself.
///
/// Each purchased line runs under a savepoint, so a failing line leaves the
/// lines before it intact and the transaction usable.
pub struct PostgresGateway {
    state: Mutex<ConnectionState>,
    auto_commit: AtomicBool,
}

impl PostgresGateway {
    /// Acquires a dedicated connection from the pool.
    pub async fn connect(pool: &PgPool) -> Result<Self> {
        let conn = pool.acquire().await?;
        Ok(Self::from_connection(conn))
    }

    /// Wraps an already acquired connection with auto-commit enabled.
    pub fn from_connection(conn: PoolConnection<Postgres>) -> Self {
        Self {
            state: Mutex::new(ConnectionState {
                conn,
                in_transaction: false,
            }),
            auto_commit: AtomicBool::new(true),
        }
    }

    /// Locks the connection, opening a transaction first if auto-commit is
    /// off and none is in effect.
    async fn connection(&self) -> Result<MutexGuard<'_, ConnectionState>> {
        let mut state = self.state.lock().await;
        if !self.auto_commit() && !state.in_transaction {
            state.in_transaction = true;
            if let Err(error) = state.conn.execute(sqlx::raw_sql("BEGIN")).await {
                state.in_transaction = false;
                return Err(error.into());
            }
        }
        Ok(state)
    }

    /// Ends the open transaction with `statement`. Issued even when no
    /// `BEGIN` is known to be in effect; the server only warns then.
    async fn end_transaction(
        &self,
        operation: &'static str,
        statement: &'static str,
    ) -> Result<()> {
        if self.auto_commit() {
            return Err(GatewayError::AutoCommitEnabled { operation });
        }
        let mut state = self.state.lock().await;
        state.conn.execute(sqlx::raw_sql(statement)).await?;
        state.in_transaction = false;
        Ok(())
    }

    async fn call_purchase(
        conn: &mut PgConnection,
        request: &PurchaseRequest,
        quantity: i32,
    ) -> Result<LineFulfillment> {
        let row = sqlx::query(
            r#"
            SELECT amount_got, total_paid
            FROM purchase_product($1, $2, $3, $4)
            "#,
        )
        .bind(request.transaction_id.get())
        .bind(request.product_id.get())
        .bind(quantity)
        .bind(request.unit_price.amount())
        .fetch_one(conn)
        .await?;

        let amount_got: Option<i32> = row.try_get("amount_got")?;
        let total_paid: Option<Decimal> = row.try_get("total_paid")?;

        Ok(LineFulfillment::new(
            to_u32("amount_got", amount_got.unwrap_or(0))?,
            Money::new(total_paid.unwrap_or_default()),
        ))
    }
}

impl std::fmt::Debug for PostgresGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresGateway")
            .field("auto_commit", &self.auto_commit())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TransactionGateway for PostgresGateway {
    fn auto_commit(&self) -> bool {
        self.auto_commit.load(Ordering::SeqCst)
    }

    async fn set_auto_commit(&self, enabled: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        match (self.auto_commit(), enabled) {
            (true, false) => {
                // Flipped before the await: if the call is abandoned after
                // `BEGIN` reached the server, the flag still reports it.
                self.auto_commit.store(false, Ordering::SeqCst);
                state.in_transaction = true;
                if let Err(error) = state.conn.execute(sqlx::raw_sql("BEGIN")).await {
                    self.auto_commit.store(true, Ordering::SeqCst);
                    state.in_transaction = false;
                    return Err(error.into());
                }
            }
            (false, true) => {
                state.conn.execute(sqlx::raw_sql("COMMIT")).await?;
                state.in_transaction = false;
                self.auto_commit.store(true, Ordering::SeqCst);
            }
            _ => {}
        }
        tracing::debug!(enabled, "auto-commit changed");
        Ok(())
    }

    async fn begin_transaction(&self) -> Result<TransactionId> {
        let mut state = self.connection().await?;
        let id: i32 = sqlx::query_scalar("SELECT begin_transaction()")
            .fetch_one(&mut *state.conn)
            .await?;
        Ok(TransactionId::new(id))
    }

    async fn purchase_line(&self, request: &PurchaseRequest) -> Result<LineFulfillment> {
        let quantity = to_i32("quantity", request.quantity)?;
        let mut state = self.connection().await?;

        let savepoint = state.in_transaction;
        if savepoint {
            state
                .conn
                .execute(sqlx::raw_sql("SAVEPOINT purchase_line"))
                .await?;
        }

        let result = Self::call_purchase(&mut state.conn, request, quantity).await;

        if savepoint {
            let cleanup = if result.is_ok() {
                "RELEASE SAVEPOINT purchase_line"
            } else {
                "ROLLBACK TO SAVEPOINT purchase_line; RELEASE SAVEPOINT purchase_line"
            };
            if let Err(error) = state.conn.execute(sqlx::raw_sql(cleanup)).await {
                if result.is_ok() {
                    return Err(error.into());
                }
                tracing::error!(%error, "failed to unwind savepoint after a failed line");
            }
        }

        result
    }

    async fn finish_transaction(
        &self,
        transaction_id: TransactionId,
        tax_rate: Decimal,
        payment_method_id: PaymentMethodId,
    ) -> Result<Money> {
        let mut state = self.connection().await?;
        let total: Option<Decimal> = sqlx::query_scalar("SELECT finish_transaction($1, $2, $3)")
            .bind(transaction_id.get())
            .bind(tax_rate)
            .bind(payment_method_id.get())
            .fetch_one(&mut *state.conn)
            .await?;
        Ok(Money::new(total.unwrap_or_default()))
    }

    async fn commit(&self) -> Result<()> {
        self.end_transaction("commit", "COMMIT").await
    }

    async fn rollback(&self) -> Result<()> {
        self.end_transaction("rollback", "ROLLBACK").await
    }
}

/// PostgreSQL-backed stock lookup over `warehouse_stock`.
#[derive(Debug, Clone)]
pub struct PostgresStock {
    pool: PgPool,
}

impl PostgresStock {
    /// Creates a new stock query over the pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_lot(row: PgRow) -> Result<StockLot> {
        Ok(StockLot {
            product_id: ProductId::new(row.try_get("product_id")?),
            product_name: row.try_get("product_name")?,
            available_quantity: to_u32("qty", row.try_get("qty")?)?,
            unit_price: Money::new(row.try_get("unit_price")?),
        })
    }
}

#[async_trait]
impl StockQuery for PostgresStock {
    async fn stock_lots(&self, product_id: ProductId) -> Result<Vec<StockLot>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, product_name, qty, unit_price
            FROM warehouse_stock
            WHERE product_id = $1 AND qty > 0
            ORDER BY unit_price ASC
            "#,
        )
        .bind(product_id.get())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_lot).collect()
    }
}
