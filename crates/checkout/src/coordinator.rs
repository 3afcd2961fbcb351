//! The order placement coordinator.

use common::UserId;
use domain::{CartItem, LineItem, NewOrder, Order};
use store::{CartStore, InventoryLedger, OrderStore, StoreError};

use crate::catalog::CatalogService;
use crate::error::CheckoutError;

/// Orchestrates cart → stock reservation → order persistence → cart
/// clear, with compensation on partial failure.
///
/// Line items are processed in cart insertion order; the first
/// reservation failure returns every already-reserved line in exact
/// reverse order and fails the whole placement. No partial order is
/// ever created, and a placement rejection leaves the cart intact.
///
/// The coordinator is not re-entrant on a stale cart snapshot: a
/// caller that timed out must re-read order and cart state before
/// retrying rather than resubmitting blindly.
pub struct PlacementCoordinator<C, L, O, P>
where
    C: CartStore,
    L: InventoryLedger,
    O: OrderStore,
    P: CatalogService,
{
    carts: C,
    ledger: L,
    orders: O,
    catalog: P,
}

impl<C, L, O, P> PlacementCoordinator<C, L, O, P>
where
    C: CartStore,
    L: InventoryLedger,
    O: OrderStore,
    P: CatalogService,
{
    /// Creates a new placement coordinator.
    pub fn new(carts: C, ledger: L, orders: O, catalog: P) -> Self {
        Self {
            carts,
            ledger,
            orders,
            catalog,
        }
    }

    /// Places an order from the user's current cart.
    #[tracing::instrument(skip(self))]
    pub async fn place_order(&self, user_id: UserId) -> Result<Order, CheckoutError> {
        metrics::counter!("placements_started_total").increment(1);

        // 1. Snapshot the cart.
        let items = self.carts.items_for_user(user_id).await?;
        if items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let items = merge_cart_lines(items);

        // 2. Validate against the catalog and fix the price snapshot.
        let mut snapshot = Vec::with_capacity(items.len());
        for item in &items {
            if item.quantity == 0 {
                return Err(CheckoutError::InvalidQuantity {
                    product_id: item.product_id.clone(),
                });
            }
            let product = self.catalog.product(&item.product_id).await?.ok_or_else(|| {
                CheckoutError::UnknownProduct {
                    product_id: item.product_id.clone(),
                }
            })?;
            if !product.is_active {
                return Err(CheckoutError::ProductUnavailable {
                    product_id: item.product_id.clone(),
                });
            }
            let unit_price = item.unit_price.unwrap_or(product.price);
            snapshot.push(LineItem::new(
                item.product_id.clone(),
                item.quantity,
                unit_price,
            ));
        }

        // 3. Reserve stock line by line; the storage layer serializes
        // racing decrements per product.
        let mut reserved = 0;
        for line in &snapshot {
            match self
                .ledger
                .conditional_decrement(&line.product_id, line.quantity)
                .await
            {
                Ok(()) => reserved += 1,
                Err(StoreError::InsufficientStock { product_id }) => {
                    self.release(&snapshot[..reserved]).await;
                    metrics::counter!("placements_compensated_total").increment(1);
                    tracing::info!(%user_id, %product_id, "placement rejected, insufficient stock");
                    return Err(CheckoutError::InsufficientStock { product_id });
                }
                Err(err) => {
                    self.release(&snapshot[..reserved]).await;
                    metrics::counter!("placements_compensated_total").increment(1);
                    return Err(err.into());
                }
            }
        }

        // 4. Persist the order; on failure every reservation is
        // returned before the error propagates.
        let order = match self.orders.create(NewOrder::new(user_id, snapshot.clone())).await {
            Ok(order) => order,
            Err(err) => {
                self.release(&snapshot).await;
                metrics::counter!("placements_compensated_total").increment(1);
                tracing::error!(%user_id, error = %err, "order persistence failed, reservations returned");
                return Err(err.into());
            }
        };

        // 5. Clear the cart. The persisted order is the source of
        // truth, so a failure here is non-fatal.
        if let Err(err) = self.carts.clear(user_id).await {
            metrics::counter!("cart_clear_failures_total").increment(1);
            tracing::warn!(%user_id, order_id = %order.id, error = %err, "cart clear failed, order stands");
        }

        metrics::counter!("placements_completed_total").increment(1);
        tracing::info!(%user_id, order_id = %order.id, total = %order.total, "order placed");
        Ok(order)
    }

    /// Returns reserved stock, most recently reserved line first.
    async fn release(&self, reserved: &[LineItem]) {
        for line in reserved.iter().rev() {
            if let Err(err) = self.ledger.increment(&line.product_id, line.quantity).await {
                tracing::error!(
                    product_id = %line.product_id,
                    quantity = line.quantity,
                    error = %err,
                    "compensation increment failed"
                );
            }
        }
    }
}

/// Collapses duplicate product rows into one line each, preserving
/// first-occurrence order, so compensation arithmetic nets out even
/// against a cart store that does not enforce the one-row-per-product
/// invariant.
fn merge_cart_lines(items: Vec<CartItem>) -> Vec<CartItem> {
    let mut merged: Vec<CartItem> = Vec::with_capacity(items.len());
    for item in items {
        if let Some(existing) = merged.iter_mut().find(|m| m.product_id == item.product_id) {
            existing.quantity += item.quantity;
            if item.unit_price.is_some() {
                existing.unit_price = item.unit_price;
            }
        } else {
            merged.push(item);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Money, ProductId};
    use domain::OrderStatus;
    use store::MemoryStore;

    use crate::catalog::InMemoryCatalog;

    type TestCoordinator = PlacementCoordinator<MemoryStore, MemoryStore, MemoryStore, InMemoryCatalog>;

    fn setup() -> (TestCoordinator, MemoryStore, InMemoryCatalog) {
        let store = MemoryStore::new();
        let catalog = InMemoryCatalog::new();
        let coordinator = PlacementCoordinator::new(
            store.clone(),
            store.clone(),
            store.clone(),
            catalog.clone(),
        );
        (coordinator, store, catalog)
    }

    fn product(id: &str) -> ProductId {
        ProductId::new(id)
    }

    async fn stock(store: &MemoryStore, id: &str) -> u32 {
        store
            .stock_of(&product(id))
            .await
            .unwrap()
            .unwrap()
            .stock_quantity
    }

    #[tokio::test]
    async fn placement_reserves_stock_and_clears_the_cart() {
        let (coordinator, store, catalog) = setup();
        let user = UserId::new();
        catalog.insert("P1", Money::from_cents(1999));
        store.set_stock(&product("P1"), 5).await;
        store.add_item(user, &product("P1"), 2, None).await.unwrap();

        let order = coordinator.place_order(user).await.unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total.cents(), 3998);
        assert_eq!(stock(&store, "P1").await, 3);
        assert!(store.items_for_user(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_cart_is_rejected() {
        let (coordinator, _, _) = setup();
        let err = coordinator.place_order(UserId::new()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
    }

    #[tokio::test]
    async fn insufficient_stock_names_the_product_and_preserves_the_cart() {
        let (coordinator, store, catalog) = setup();
        let user = UserId::new();
        catalog.insert("P2", Money::from_cents(500));
        store.set_stock(&product("P2"), 5).await;
        store
            .add_item(user, &product("P2"), 20, None)
            .await
            .unwrap();

        let err = coordinator.place_order(user).await.unwrap_err();

        match err {
            CheckoutError::InsufficientStock { product_id } => {
                assert_eq!(product_id, product("P2"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(stock(&store, "P2").await, 5);
        assert_eq!(store.items_for_user(user).await.unwrap().len(), 1);
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn failure_mid_reservation_restores_every_reserved_line() {
        let (coordinator, store, catalog) = setup();
        let user = UserId::new();
        for (id, stock_qty) in [("A", 10), ("B", 10), ("C", 1)] {
            catalog.insert(id, Money::from_cents(100));
            store.set_stock(&product(id), stock_qty).await;
        }
        store.add_item(user, &product("A"), 3, None).await.unwrap();
        store.add_item(user, &product("B"), 4, None).await.unwrap();
        store.add_item(user, &product("C"), 2, None).await.unwrap();

        let err = coordinator.place_order(user).await.unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::InsufficientStock { ref product_id } if product_id == &product("C")
        ));
        assert_eq!(stock(&store, "A").await, 10);
        assert_eq!(stock(&store, "B").await, 10);
        assert_eq!(stock(&store, "C").await, 1);
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn persistence_failure_compensates_and_surfaces_a_storage_error() {
        let (coordinator, store, catalog) = setup();
        let user = UserId::new();
        catalog.insert("P1", Money::from_cents(100));
        store.set_stock(&product("P1"), 5).await;
        store.add_item(user, &product("P1"), 2, None).await.unwrap();
        store.set_fail_on_order_create(true).await;

        let err = coordinator.place_order(user).await.unwrap_err();

        assert!(matches!(err, CheckoutError::Store(_)));
        assert!(!err.is_client_error());
        assert_eq!(stock(&store, "P1").await, 5);
        assert_eq!(store.items_for_user(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cart_clear_failure_does_not_roll_back_the_order() {
        let (coordinator, store, catalog) = setup();
        let user = UserId::new();
        catalog.insert("P1", Money::from_cents(100));
        store.set_stock(&product("P1"), 5).await;
        store.add_item(user, &product("P1"), 1, None).await.unwrap();
        store.set_fail_on_cart_clear(true).await;

        let order = coordinator.place_order(user).await.unwrap();

        assert_eq!(store.fetch_order(order.id).await.unwrap().unwrap(), order);
        assert_eq!(stock(&store, "P1").await, 4);
        // The cart survives; a later cleanup will catch it.
        assert_eq!(store.items_for_user(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_product_is_rejected_before_any_reservation() {
        let (coordinator, store, _) = setup();
        let user = UserId::new();
        store
            .add_item(user, &product("ghost"), 1, None)
            .await
            .unwrap();

        let err = coordinator.place_order(user).await.unwrap_err();
        assert!(matches!(err, CheckoutError::UnknownProduct { .. }));
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn inactive_product_is_rejected() {
        let (coordinator, store, catalog) = setup();
        let user = UserId::new();
        catalog.insert("P1", Money::from_cents(100));
        catalog.deactivate(&product("P1"));
        store.set_stock(&product("P1"), 5).await;
        store.add_item(user, &product("P1"), 1, None).await.unwrap();

        let err = coordinator.place_order(user).await.unwrap_err();
        assert!(matches!(err, CheckoutError::ProductUnavailable { .. }));
        assert_eq!(stock(&store, "P1").await, 5);
    }

    #[tokio::test]
    async fn cart_snapshot_price_wins_over_catalog_price() {
        let (coordinator, store, catalog) = setup();
        let user = UserId::new();
        catalog.insert("P1", Money::from_cents(2000));
        store.set_stock(&product("P1"), 5).await;
        store
            .add_item(user, &product("P1"), 2, Some(Money::from_cents(1500)))
            .await
            .unwrap();

        let order = coordinator.place_order(user).await.unwrap();
        assert_eq!(order.total.cents(), 3000);
    }

    #[test]
    fn merge_collapses_duplicate_product_rows() {
        let user = UserId::new();
        let items = vec![
            CartItem::new(user, "P1", 2),
            CartItem::new(user, "P2", 1),
            CartItem::new(user, "P1", 3),
        ];

        let merged = merge_cart_lines(items);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].product_id, ProductId::new("P1"));
        assert_eq!(merged[0].quantity, 5);
        assert_eq!(merged[1].product_id, ProductId::new("P2"));
    }
}
