//! In-memory storage implementation for testing and single-node runs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};
use domain::{CartItem, InventoryRecord, NewOrder, Order, OrderStatus};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::carts::CartStore;
use crate::error::{Result, StoreError};
use crate::inventory::InventoryLedger;
use crate::keyvalue::{PutOutcome, TtlStore, expiry_from_now};
use crate::orders::OrderStore;

#[derive(Debug, Default)]
struct MemoryState {
    inventory: HashMap<ProductId, u32>,
    orders: HashMap<OrderId, Order>,
    carts: HashMap<UserId, Vec<CartItem>>,
    keys: HashMap<String, (Value, DateTime<Utc>)>,
    fail_on_order_create: bool,
    fail_on_cart_clear: bool,
    keystore_unavailable: bool,
}

/// In-memory store implementing all four persistence traits.
///
/// Every operation takes the single state lock exactly once, so each
/// call is atomic with respect to every other; the conditional
/// decrement in particular is a check-and-subtract under one lock
/// acquisition, matching the WHERE-predicate update the PostgreSQL
/// backend issues.
///
/// The `set_fail_on_*` toggles inject faults for exercising
/// compensation and degraded-mode paths in tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a product's stock to an absolute value.
    pub async fn set_stock(&self, product_id: &ProductId, quantity: u32) {
        self.state
            .write()
            .await
            .inventory
            .insert(product_id.clone(), quantity);
    }

    /// Returns the number of persisted orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Makes the next and all subsequent order inserts fail.
    pub async fn set_fail_on_order_create(&self, fail: bool) {
        self.state.write().await.fail_on_order_create = fail;
    }

    /// Makes cart clearing fail.
    pub async fn set_fail_on_cart_clear(&self, fail: bool) {
        self.state.write().await.fail_on_cart_clear = fail;
    }

    /// Makes every keystore operation fail as unreachable.
    pub async fn set_keystore_unavailable(&self, unavailable: bool) {
        self.state.write().await.keystore_unavailable = unavailable;
    }

    /// Returns the number of unexpired keystore entries.
    pub async fn live_key_count(&self) -> usize {
        let now = Utc::now();
        self.state
            .read()
            .await
            .keys
            .values()
            .filter(|(_, expires_at)| *expires_at > now)
            .count()
    }
}

#[async_trait]
impl InventoryLedger for MemoryStore {
    async fn conditional_decrement(&self, product_id: &ProductId, amount: u32) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }

        let mut state = self.state.write().await;
        let stock = state
            .inventory
            .get_mut(product_id)
            .ok_or_else(|| StoreError::ProductNotFound(product_id.clone()))?;

        if *stock >= amount {
            *stock -= amount;
            Ok(())
        } else {
            metrics::counter!("stock_decrement_rejected_total").increment(1);
            tracing::debug!(%product_id, amount, available = *stock, "stock decrement rejected");
            Err(StoreError::InsufficientStock {
                product_id: product_id.clone(),
            })
        }
    }

    async fn increment(&self, product_id: &ProductId, amount: u32) -> Result<()> {
        let mut state = self.state.write().await;
        *state.inventory.entry(product_id.clone()).or_insert(0) += amount;
        Ok(())
    }

    async fn stock_of(&self, product_id: &ProductId) -> Result<Option<InventoryRecord>> {
        let state = self.state.read().await;
        Ok(state
            .inventory
            .get(product_id)
            .map(|&stock_quantity| InventoryRecord {
                product_id: product_id.clone(),
                stock_quantity,
            }))
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create(&self, new_order: NewOrder) -> Result<Order> {
        let mut state = self.state.write().await;
        if state.fail_on_order_create {
            return Err(StoreError::Unavailable("order insert failed".to_string()));
        }

        let now = Utc::now();
        let order = Order {
            id: OrderId::new(),
            user_id: new_order.user_id,
            status: OrderStatus::Pending,
            total: new_order.total(),
            line_items: new_order.line_items,
            payment_provider: new_order.payment_provider,
            payment_transaction_id: None,
            created_at: now,
            updated_at: now,
        };
        state.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|order| order.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn update_status(&self, id: OrderId, new_status: OrderStatus) -> Result<Order> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&id)
            .ok_or(StoreError::OrderNotFound(id))?;

        order.status = order.status.transition_to(new_status)?;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn record_payment(
        &self,
        id: OrderId,
        provider: &str,
        transaction_id: &str,
    ) -> Result<Order> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&id)
            .ok_or(StoreError::OrderNotFound(id))?;

        order.payment_provider = Some(provider.to_string());
        order.payment_transaction_id = Some(transaction_id.to_string());
        order.updated_at = Utc::now();
        Ok(order.clone())
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn add_item(
        &self,
        user_id: UserId,
        product_id: &ProductId,
        quantity: u32,
        unit_price: Option<Money>,
    ) -> Result<CartItem> {
        let mut state = self.state.write().await;
        let items = state.carts.entry(user_id).or_default();

        if let Some(item) = items.iter_mut().find(|i| &i.product_id == product_id) {
            item.quantity += quantity;
            if unit_price.is_some() {
                item.unit_price = unit_price;
            }
            Ok(item.clone())
        } else {
            let mut item = CartItem::new(user_id, product_id.clone(), quantity);
            item.unit_price = unit_price;
            items.push(item.clone());
            Ok(item)
        }
    }

    async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let items = state.carts.entry(user_id).or_default();

        if quantity == 0 {
            items.retain(|i| &i.product_id != product_id);
            return Ok(());
        }

        let item = items
            .iter_mut()
            .find(|i| &i.product_id == product_id)
            .ok_or_else(|| StoreError::CartItemNotFound(product_id.clone()))?;
        item.quantity = quantity;
        Ok(())
    }

    async fn remove_item(&self, user_id: UserId, product_id: &ProductId) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(items) = state.carts.get_mut(&user_id) {
            items.retain(|i| &i.product_id != product_id);
        }
        Ok(())
    }

    async fn items_for_user(&self, user_id: UserId) -> Result<Vec<CartItem>> {
        let state = self.state.read().await;
        Ok(state.carts.get(&user_id).cloned().unwrap_or_default())
    }

    async fn clear(&self, user_id: UserId) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_cart_clear {
            return Err(StoreError::Unavailable("cart clear failed".to_string()));
        }
        state.carts.remove(&user_id);
        Ok(())
    }
}

#[async_trait]
impl TtlStore for MemoryStore {
    async fn put_if_absent(&self, key: &str, value: Value, ttl: Duration) -> Result<PutOutcome> {
        let mut state = self.state.write().await;
        if state.keystore_unavailable {
            return Err(StoreError::Unavailable("keystore unreachable".to_string()));
        }

        let now = Utc::now();
        if let Some((existing, expires_at)) = state.keys.get(key)
            && *expires_at > now
        {
            return Ok(PutOutcome::Exists(existing.clone()));
        }

        state
            .keys
            .insert(key.to_string(), (value, expiry_from_now(ttl)));
        Ok(PutOutcome::Inserted)
    }

    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let mut state = self.state.write().await;
        if state.keystore_unavailable {
            return Err(StoreError::Unavailable("keystore unreachable".to_string()));
        }
        state
            .keys
            .insert(key.to_string(), (value, expiry_from_now(ttl)));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let state = self.state.read().await;
        if state.keystore_unavailable {
            return Err(StoreError::Unavailable("keystore unreachable".to_string()));
        }

        let now = Utc::now();
        Ok(state
            .keys
            .get(key)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(value, _)| value.clone()))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if state.keystore_unavailable {
            return Err(StoreError::Unavailable("keystore unreachable".to_string()));
        }
        state.keys.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::LineItem;
    use serde_json::json;

    fn product(id: &str) -> ProductId {
        ProductId::new(id)
    }

    #[tokio::test]
    async fn decrement_within_stock_succeeds() {
        let store = MemoryStore::new();
        store.set_stock(&product("P1"), 10).await;

        store.conditional_decrement(&product("P1"), 4).await.unwrap();

        let record = store.stock_of(&product("P1")).await.unwrap().unwrap();
        assert_eq!(record.stock_quantity, 6);
    }

    #[tokio::test]
    async fn decrement_beyond_stock_is_rejected_and_leaves_stock_untouched() {
        let store = MemoryStore::new();
        store.set_stock(&product("P1"), 3).await;

        let err = store
            .conditional_decrement(&product("P1"), 4)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InsufficientStock { .. }));

        let record = store.stock_of(&product("P1")).await.unwrap().unwrap();
        assert_eq!(record.stock_quantity, 3);
    }

    #[tokio::test]
    async fn zero_decrement_is_a_noop_success() {
        let store = MemoryStore::new();
        store.conditional_decrement(&product("P1"), 0).await.unwrap();
        assert!(store.stock_of(&product("P1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn decrement_unknown_product_fails() {
        let store = MemoryStore::new();
        let err = store
            .conditional_decrement(&product("ghost"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ProductNotFound(_)));
    }

    #[tokio::test]
    async fn increment_creates_missing_record() {
        let store = MemoryStore::new();
        store.increment(&product("P1"), 5).await.unwrap();
        store.increment(&product("P1"), 2).await.unwrap();

        let record = store.stock_of(&product("P1")).await.unwrap().unwrap();
        assert_eq!(record.stock_quantity, 7);
    }

    #[tokio::test]
    async fn order_create_assigns_pending_and_snapshot_total() {
        let store = MemoryStore::new();
        let user = UserId::new();

        let order = store
            .create(NewOrder::new(
                user,
                vec![
                    LineItem::new("P1", 2, Money::from_cents(1000)),
                    LineItem::new("P2", 1, Money::from_cents(500)),
                ],
            ))
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total.cents(), 2500);
        assert_eq!(store.fetch_order(order.id).await.unwrap().unwrap(), order);
    }

    #[tokio::test]
    async fn update_status_enforces_the_state_machine() {
        let store = MemoryStore::new();
        let order = store
            .create(NewOrder::new(
                UserId::new(),
                vec![LineItem::new("P1", 1, Money::from_cents(100))],
            ))
            .await
            .unwrap();

        let err = store
            .update_status(order.id, OrderStatus::Paid)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Order(_)));

        let order = store
            .update_status(order.id, OrderStatus::Processing)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Processing);

        let order = store
            .update_status(order.id, OrderStatus::Paid)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn update_status_of_unknown_order_fails() {
        let store = MemoryStore::new();
        let err = store
            .update_status(OrderId::new(), OrderStatus::Processing)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::OrderNotFound(_)));
    }

    #[tokio::test]
    async fn cart_add_upserts_per_product() {
        let store = MemoryStore::new();
        let user = UserId::new();

        store
            .add_item(user, &product("P1"), 2, Some(Money::from_cents(1000)))
            .await
            .unwrap();
        store.add_item(user, &product("P2"), 1, None).await.unwrap();
        store.add_item(user, &product("P1"), 3, None).await.unwrap();

        let items = store.items_for_user(user).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].product_id, product("P1"));
        assert_eq!(items[0].quantity, 5);
        assert_eq!(items[0].unit_price, Some(Money::from_cents(1000)));
        assert_eq!(items[1].product_id, product("P2"));
    }

    #[tokio::test]
    async fn cart_set_quantity_zero_removes_the_row() {
        let store = MemoryStore::new();
        let user = UserId::new();
        store.add_item(user, &product("P1"), 2, None).await.unwrap();

        store.set_quantity(user, &product("P1"), 0).await.unwrap();
        assert!(store.items_for_user(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cart_clear_failure_is_injectable() {
        let store = MemoryStore::new();
        let user = UserId::new();
        store.add_item(user, &product("P1"), 1, None).await.unwrap();

        store.set_fail_on_cart_clear(true).await;
        assert!(store.clear(user).await.is_err());

        store.set_fail_on_cart_clear(false).await;
        store.clear(user).await.unwrap();
        assert!(store.items_for_user(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn put_if_absent_first_write_wins() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);

        let first = store
            .put_if_absent("k", json!({"attempt": 1}), ttl)
            .await
            .unwrap();
        assert!(first.inserted());

        let second = store
            .put_if_absent("k", json!({"attempt": 2}), ttl)
            .await
            .unwrap();
        assert_eq!(second, PutOutcome::Exists(json!({"attempt": 1})));
    }

    #[tokio::test]
    async fn expired_key_behaves_like_an_absent_one() {
        let store = MemoryStore::new();

        let first = store
            .put_if_absent("k", json!(1), Duration::ZERO)
            .await
            .unwrap();
        assert!(first.inserted());
        assert_eq!(store.get("k").await.unwrap(), None);

        let second = store
            .put_if_absent("k", json!(2), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(second.inserted());
        assert_eq!(store.get("k").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn remove_makes_the_key_writable_again() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);

        store.put_if_absent("k", json!(1), ttl).await.unwrap();
        store.remove("k").await.unwrap();

        let outcome = store.put_if_absent("k", json!(2), ttl).await.unwrap();
        assert!(outcome.inserted());
    }

    #[tokio::test]
    async fn unavailable_keystore_surfaces_as_transient_error() {
        let store = MemoryStore::new();
        store.set_keystore_unavailable(true).await;

        let err = store
            .put_if_absent("k", json!(1), Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
