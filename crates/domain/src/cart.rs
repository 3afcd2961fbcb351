//! Cart line items held per user until checkout.

use chrono::{DateTime, Utc};
use common::{Money, ProductId, UserId};
use serde::{Deserialize, Serialize};

/// A line item in a user's cart.
///
/// A cart holds at most one row per product; adding an existing
/// product accumulates its quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: u32,

    /// Optional price snapshot taken when the item was added. When
    /// absent, checkout resolves the price from the catalog.
    pub unit_price: Option<Money>,

    pub added_at: DateTime<Utc>,
}

impl CartItem {
    pub fn new(user_id: UserId, product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            user_id,
            product_id: product_id.into(),
            quantity,
            unit_price: None,
            added_at: Utc::now(),
        }
    }

    /// Attaches a price snapshot.
    pub fn with_price(mut self, unit_price: Money) -> Self {
        self.unit_price = Some(unit_price);
        self
    }
}
