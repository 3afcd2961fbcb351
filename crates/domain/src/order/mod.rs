//! The order aggregate.

mod status;

pub use status::OrderStatus;

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

/// A priced line captured from the cart at checkout time.
///
/// The unit price is a snapshot; later catalog price changes never
/// affect an order that has already been placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// The product identifier.
    pub product_id: ProductId,

    /// Quantity ordered.
    pub quantity: u32,

    /// Price per unit at the time the order was placed.
    pub unit_price: Money,
}

impl LineItem {
    /// Creates a new line item.
    pub fn new(product_id: impl Into<ProductId>, quantity: u32, unit_price: Money) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            unit_price,
        }
    }

    /// Returns the total price for this line (quantity * unit_price).
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Input for creating an order; the store assigns id, status, and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: UserId,
    pub line_items: Vec<LineItem>,
    pub payment_provider: Option<String>,
}

impl NewOrder {
    /// Creates a new order input for a user.
    pub fn new(user_id: UserId, line_items: Vec<LineItem>) -> Self {
        Self {
            user_id,
            line_items,
            payment_provider: None,
        }
    }

    /// Sets the payment provider the order will settle through.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.payment_provider = Some(provider.into());
        self
    }

    /// The order total, summed from the line item snapshots.
    pub fn total(&self) -> Money {
        total_of(&self.line_items)
    }
}

/// A placed order.
///
/// Orders are never deleted; they move through the
/// [`OrderStatus`] state machine until a terminal status is reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub line_items: Vec<LineItem>,

    /// Fixed at creation from the line item snapshot; never recomputed.
    pub total: Money,

    pub payment_provider: Option<String>,
    pub payment_transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Returns true if no further status transitions are possible.
    pub fn is_settled(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Sums line totals into an order total.
pub fn total_of(line_items: &[LineItem]) -> Money {
    line_items
        .iter()
        .fold(Money::zero(), |acc, item| acc + item.line_total())
}
