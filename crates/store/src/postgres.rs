//! PostgreSQL-backed storage implementation.

use std::time::Duration;

use async_trait::async_trait;
use common::{Money, OrderId, ProductId, UserId};
use domain::{CartItem, InventoryRecord, LineItem, NewOrder, Order, OrderError, OrderStatus};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::carts::CartStore;
use crate::error::{Result, StoreError};
use crate::inventory::InventoryLedger;
use crate::keyvalue::{PutOutcome, TtlStore, expiry_from_now};
use crate::orders::OrderStore;

/// PostgreSQL store implementing all four persistence traits.
///
/// The conditional decrement is a single `UPDATE … WHERE stock_quantity
/// >= $n` statement and the table carries a `CHECK (stock_quantity >=
/// 0)` constraint, so stock can never go negative regardless of what
/// the application does. The set-if-absent primitive is one
/// `INSERT … ON CONFLICT` statement that also reclaims expired keys.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the given database URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPool::connect(url).await?;
        Ok(Self { pool })
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_order(row: &PgRow) -> Result<Order> {
        let line_items: Vec<LineItem> = serde_json::from_value(row.try_get("line_items")?)?;
        let status: OrderStatus = row.try_get::<String, _>("status")?.parse()?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            status,
            line_items,
            total: Money::from_cents(row.try_get("total_cents")?),
            payment_provider: row.try_get("payment_provider")?,
            payment_transaction_id: row.try_get("payment_transaction_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_cart_item(row: &PgRow) -> Result<CartItem> {
        Ok(CartItem {
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
            quantity: row.try_get::<i64, _>("quantity")? as u32,
            unit_price: row
                .try_get::<Option<i64>, _>("unit_price_cents")?
                .map(Money::from_cents),
            added_at: row.try_get("added_at")?,
        })
    }
}

const ORDER_COLUMNS: &str = "id, user_id, status, line_items, total_cents, \
     payment_provider, payment_transaction_id, created_at, updated_at";

#[async_trait]
impl InventoryLedger for PostgresStore {
    async fn conditional_decrement(&self, product_id: &ProductId, amount: u32) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }

        let result = sqlx::query(
            "UPDATE inventory SET stock_quantity = stock_quantity - $2 \
             WHERE product_id = $1 AND stock_quantity >= $2",
        )
        .bind(product_id.as_str())
        .bind(amount as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        let exists: Option<i64> =
            sqlx::query_scalar("SELECT stock_quantity FROM inventory WHERE product_id = $1")
                .bind(product_id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        match exists {
            Some(available) => {
                metrics::counter!("stock_decrement_rejected_total").increment(1);
                tracing::debug!(%product_id, amount, available, "stock decrement rejected");
                Err(StoreError::InsufficientStock {
                    product_id: product_id.clone(),
                })
            }
            None => Err(StoreError::ProductNotFound(product_id.clone())),
        }
    }

    async fn increment(&self, product_id: &ProductId, amount: u32) -> Result<()> {
        sqlx::query(
            "INSERT INTO inventory (product_id, stock_quantity) VALUES ($1, $2) \
             ON CONFLICT (product_id) \
             DO UPDATE SET stock_quantity = inventory.stock_quantity + EXCLUDED.stock_quantity",
        )
        .bind(product_id.as_str())
        .bind(amount as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn stock_of(&self, product_id: &ProductId) -> Result<Option<InventoryRecord>> {
        let stock: Option<i64> =
            sqlx::query_scalar("SELECT stock_quantity FROM inventory WHERE product_id = $1")
                .bind(product_id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        Ok(stock.map(|stock_quantity| InventoryRecord {
            product_id: product_id.clone(),
            stock_quantity: stock_quantity as u32,
        }))
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn create(&self, new_order: NewOrder) -> Result<Order> {
        let id = OrderId::new();
        let total = new_order.total();
        let line_items = serde_json::to_value(&new_order.line_items)?;

        let row = sqlx::query(&format!(
            "INSERT INTO orders (id, user_id, status, line_items, total_cents, payment_provider) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(new_order.user_id.as_uuid())
        .bind(OrderStatus::Pending.as_str())
        .bind(line_items)
        .bind(total.cents())
        .bind(&new_order.payment_provider)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_order(&row)
    }

    async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_order).transpose()
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_order).collect()
    }

    async fn update_status(&self, id: OrderId, new_status: OrderStatus) -> Result<Order> {
        let current = self
            .fetch_order(id)
            .await?
            .ok_or(StoreError::OrderNotFound(id))?;
        current.status.transition_to(new_status)?;

        // Compare-and-set against the status we validated, so a
        // concurrent transition cannot slip an unlisted edge through.
        let result = sqlx::query(
            "UPDATE orders SET status = $2, updated_at = now() WHERE id = $1 AND status = $3",
        )
        .bind(id.as_uuid())
        .bind(new_status.as_str())
        .bind(current.status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let fresh = self
                .fetch_order(id)
                .await?
                .ok_or(StoreError::OrderNotFound(id))?;
            return Err(StoreError::Order(OrderError::InvalidTransition {
                from: fresh.status,
                to: new_status,
            }));
        }

        self.fetch_order(id)
            .await?
            .ok_or(StoreError::OrderNotFound(id))
    }

    async fn record_payment(
        &self,
        id: OrderId,
        provider: &str,
        transaction_id: &str,
    ) -> Result<Order> {
        let row = sqlx::query(&format!(
            "UPDATE orders SET payment_provider = $2, payment_transaction_id = $3, \
             updated_at = now() WHERE id = $1 \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(provider)
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_order(&row),
            None => Err(StoreError::OrderNotFound(id)),
        }
    }
}

#[async_trait]
impl CartStore for PostgresStore {
    async fn add_item(
        &self,
        user_id: UserId,
        product_id: &ProductId,
        quantity: u32,
        unit_price: Option<Money>,
    ) -> Result<CartItem> {
        let row = sqlx::query(
            "INSERT INTO cart_items (user_id, product_id, quantity, unit_price_cents) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id, product_id) DO UPDATE SET \
                 quantity = cart_items.quantity + EXCLUDED.quantity, \
                 unit_price_cents = COALESCE(EXCLUDED.unit_price_cents, cart_items.unit_price_cents) \
             RETURNING user_id, product_id, quantity, unit_price_cents, added_at",
        )
        .bind(user_id.as_uuid())
        .bind(product_id.as_str())
        .bind(quantity as i64)
        .bind(unit_price.map(|p| p.cents()))
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_cart_item(&row)
    }

    async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<()> {
        if quantity == 0 {
            return self.remove_item(user_id, product_id).await;
        }

        let result = sqlx::query(
            "UPDATE cart_items SET quantity = $3 WHERE user_id = $1 AND product_id = $2",
        )
        .bind(user_id.as_uuid())
        .bind(product_id.as_str())
        .bind(quantity as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::CartItemNotFound(product_id.clone()));
        }
        Ok(())
    }

    async fn remove_item(&self, user_id: UserId, product_id: &ProductId) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id.as_uuid())
            .bind(product_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn items_for_user(&self, user_id: UserId) -> Result<Vec<CartItem>> {
        let rows = sqlx::query(
            "SELECT user_id, product_id, quantity, unit_price_cents, added_at \
             FROM cart_items WHERE user_id = $1 ORDER BY added_at, product_id",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_cart_item).collect()
    }

    async fn clear(&self, user_id: UserId) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TtlStore for PostgresStore {
    async fn put_if_absent(&self, key: &str, value: Value, ttl: Duration) -> Result<PutOutcome> {
        // One atomic statement decides the race: the insert wins on an
        // absent key and reclaims an expired one; a live key leaves
        // zero rows returned.
        let inserted = sqlx::query(
            "INSERT INTO processed_events (key, value, expires_at) VALUES ($1, $2, $3) \
             ON CONFLICT (key) DO UPDATE SET \
                 value = EXCLUDED.value, expires_at = EXCLUDED.expires_at \
                 WHERE processed_events.expires_at <= now() \
             RETURNING key",
        )
        .bind(key)
        .bind(&value)
        .bind(expiry_from_now(ttl))
        .fetch_optional(&self.pool)
        .await?;

        if inserted.is_some() {
            return Ok(PutOutcome::Inserted);
        }

        let stored: Option<Value> =
            sqlx::query_scalar("SELECT value FROM processed_events WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(PutOutcome::Exists(stored.unwrap_or(Value::Null)))
    }

    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        sqlx::query(
            "INSERT INTO processed_events (key, value, expires_at) VALUES ($1, $2, $3) \
             ON CONFLICT (key) DO UPDATE SET \
                 value = EXCLUDED.value, expires_at = EXCLUDED.expires_at",
        )
        .bind(key)
        .bind(&value)
        .bind(expiry_from_now(ttl))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let value: Option<Value> = sqlx::query_scalar(
            "SELECT value FROM processed_events WHERE key = $1 AND expires_at > now()",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(value)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM processed_events WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
