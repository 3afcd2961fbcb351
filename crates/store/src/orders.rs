//! Order persistence.

use async_trait::async_trait;
use common::{OrderId, UserId};
use domain::{NewOrder, Order, OrderStatus};

use crate::error::Result;

/// Persistence for the order aggregate.
///
/// Orders are created once at checkout and never deleted; status
/// changes go through [`update_status`](OrderStore::update_status),
/// which admits only edges of the
/// [`OrderStatus`] state machine.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new order with a generated id, status
    /// [`OrderStatus::Pending`], and the total computed from the line
    /// item snapshot.
    async fn create(&self, new_order: NewOrder) -> Result<Order>;

    /// Loads an order by id.
    async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lists a user's orders, most recent first.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Moves an order to `new_status`, rejecting edges the state
    /// machine does not list.
    async fn update_status(&self, id: OrderId, new_status: OrderStatus) -> Result<Order>;

    /// Stamps payment provider metadata onto an order.
    async fn record_payment(
        &self,
        id: OrderId,
        provider: &str,
        transaction_id: &str,
    ) -> Result<Order>;
}
