//! Cart persistence.

use async_trait::async_trait;
use common::{Money, ProductId, UserId};
use domain::CartItem;

use crate::error::Result;

/// Per-user cart line items.
///
/// A cart holds one row per (user, product); `add_item` upserts and
/// accumulates quantity, so duplicate product rows cannot appear.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Adds quantity of a product to the user's cart, creating the
    /// row if needed. A provided price snapshot replaces an earlier
    /// one.
    async fn add_item(
        &self,
        user_id: UserId,
        product_id: &ProductId,
        quantity: u32,
        unit_price: Option<Money>,
    ) -> Result<CartItem>;

    /// Replaces the quantity of an existing row; zero removes it.
    async fn set_quantity(&self, user_id: UserId, product_id: &ProductId, quantity: u32)
    -> Result<()>;

    /// Removes a product from the cart. Removing an absent product is
    /// a no-op.
    async fn remove_item(&self, user_id: UserId, product_id: &ProductId) -> Result<()>;

    /// Returns the cart contents in insertion order.
    async fn items_for_user(&self, user_id: UserId) -> Result<Vec<CartItem>>;

    /// Empties the user's cart.
    async fn clear(&self, user_id: UserId) -> Result<()>;
}
