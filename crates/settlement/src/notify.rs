//! Downstream notification hooks.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::OrderId;
use domain::Order;

/// Fire-and-forget notifications about settled orders.
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Announces that an order has been paid. Called at most once per
    /// order per applied event.
    async fn notify_order_paid(&self, order: &Order);
}

/// Notifier that only writes a log line.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationService for LogNotifier {
    async fn notify_order_paid(&self, order: &Order) {
        tracing::info!(order_id = %order.id, user_id = %order.user_id, total = %order.total, "order paid");
    }
}

/// In-memory notifier recording deliveries for tests.
#[derive(Debug, Clone, Default)]
pub struct CountingNotifier {
    sent: Arc<RwLock<Vec<OrderId>>>,
}

impl CountingNotifier {
    /// Creates a new notifier with no recorded deliveries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of notifications sent.
    pub fn sent_count(&self) -> usize {
        self.sent.read().unwrap().len()
    }

    /// Returns true if a notification went out for the given order.
    pub fn notified(&self, order_id: OrderId) -> bool {
        self.sent.read().unwrap().contains(&order_id)
    }
}

#[async_trait]
impl NotificationService for CountingNotifier {
    async fn notify_order_paid(&self, order: &Order) {
        self.sent.write().unwrap().push(order.id);
    }
}
