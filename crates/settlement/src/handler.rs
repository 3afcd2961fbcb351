//! The payment settlement handler.

use std::time::Duration;

use common::OrderId;
use domain::{Order, OrderStatus};
use idempotency::{GuardOutcome, IdempotencyGuard};
use serde_json::json;
use store::{OrderStore, StoreError, TtlStore};
use uuid::Uuid;

use crate::error::SettlementError;
use crate::event::{PaymentEvent, SettlementResult};
use crate::notify::NotificationService;

/// How long a consumed provider event id stays reserved.
pub const DEFAULT_DEDUPE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Applies inbound payment notifications to orders at most once.
///
/// The dedupe key is reserved before any mutation and kept afterwards
/// whatever happens: an event whose transition fails after the key is
/// reserved is confirmed as unapplied and flagged for reconciliation
/// rather than released for retry, because a redelivered retry could
/// double-fire side effects whose first attempt partially landed.
pub struct SettlementHandler<O, K, N>
where
    O: OrderStore,
    K: TtlStore,
    N: NotificationService,
{
    orders: O,
    guard: IdempotencyGuard<K>,
    notifier: N,
    dedupe_ttl: Duration,
}

impl<O, K, N> SettlementHandler<O, K, N>
where
    O: OrderStore,
    K: TtlStore,
    N: NotificationService,
{
    /// Creates a handler with the default 7-day dedupe window.
    pub fn new(orders: O, keystore: K, notifier: N) -> Self {
        Self {
            orders,
            guard: IdempotencyGuard::new(keystore),
            notifier,
            dedupe_ttl: DEFAULT_DEDUPE_TTL,
        }
    }

    /// Overrides the dedupe window.
    pub fn with_dedupe_ttl(mut self, ttl: Duration) -> Self {
        self.dedupe_ttl = ttl;
        self
    }

    /// Handles one delivery of a provider event.
    ///
    /// Returns an error only for payload validation failures, which
    /// are checked before the dedupe key is reserved. Every later
    /// outcome resolves to a [`SettlementResult`].
    #[tracing::instrument(skip(self, event), fields(event_id = ?event.provider_event_id))]
    pub async fn handle(
        &self,
        provider: &str,
        event: &PaymentEvent,
    ) -> Result<SettlementResult, SettlementError> {
        metrics::counter!("settlement_events_total").increment(1);

        let target = target_status(&event.data.status)?;
        let order_id = parse_order_reference(&event.data.order_reference)?;

        let key = match &event.provider_event_id {
            Some(event_id) => {
                let params = json!({ "provider": provider, "event_id": event_id });
                let key = IdempotencyGuard::<K>::key("webhook", &params);
                match self
                    .guard
                    .check_and_store(&key, json!({ "status": "pending" }), self.dedupe_ttl)
                    .await
                {
                    GuardOutcome::Duplicate(_) => {
                        metrics::counter!("settlement_duplicates_total").increment(1);
                        tracing::info!(provider, %order_id, "duplicate provider event ignored");
                        return Ok(SettlementResult::duplicate());
                    }
                    GuardOutcome::New => Some(key),
                    // Guard failed open; settle anyway.
                    GuardOutcome::Unavailable => None,
                }
            }
            None => {
                metrics::counter!("settlement_undeduped_total").increment(1);
                tracing::warn!(provider, %order_id, "event without provider id, processing without dedupe");
                None
            }
        };

        match self.apply(provider, event, order_id, target).await {
            Ok(order) => {
                if let Some(key) = key {
                    self.guard
                        .confirm(
                            &key,
                            json!({ "status": "applied", "order_id": order.id }),
                            self.dedupe_ttl,
                        )
                        .await;
                }
                metrics::counter!("settlement_applied_total").increment(1);
                Ok(SettlementResult::applied())
            }
            Err(err) => {
                if let Some(key) = key {
                    self.guard
                        .confirm(
                            &key,
                            json!({ "status": "unapplied", "error": err.to_string() }),
                            self.dedupe_ttl,
                        )
                        .await;
                }
                metrics::counter!("settlement_unapplied_total").increment(1);
                tracing::error!(
                    provider,
                    %order_id,
                    error = %err,
                    "event recorded but not applied, flagged for reconciliation"
                );
                Ok(SettlementResult::unapplied())
            }
        }
    }

    /// Applies the status change and fires downstream notifications.
    async fn apply(
        &self,
        provider: &str,
        event: &PaymentEvent,
        order_id: OrderId,
        target: OrderStatus,
    ) -> Result<Order, StoreError> {
        let order = self
            .orders
            .fetch_order(order_id)
            .await?
            .ok_or(StoreError::OrderNotFound(order_id))?;

        // Already there: a no-op rather than a rejected edge, so a
        // redelivery that slipped past a failed-open guard stays
        // harmless.
        if order.status == target {
            tracing::info!(%order_id, status = %target, "order already in target status");
            return Ok(order);
        }

        // Providers that collapse authorization and capture into one
        // notification deliver `paid` against a pending order; step
        // through Processing to keep to the state machine's edges.
        if order.status == OrderStatus::Pending && target == OrderStatus::Paid {
            self.orders
                .update_status(order_id, OrderStatus::Processing)
                .await?;
        }

        let mut order = self.orders.update_status(order_id, target).await?;
        if let Some(event_id) = &event.provider_event_id {
            order = self.orders.record_payment(order_id, provider, event_id).await?;
        }

        if order.status == OrderStatus::Paid {
            self.notifier.notify_order_paid(&order).await;
            metrics::counter!("settlement_notifications_total").increment(1);
        }

        Ok(order)
    }
}

fn parse_order_reference(reference: &str) -> Result<OrderId, SettlementError> {
    if reference.is_empty() {
        return Err(SettlementError::MissingOrderReference);
    }
    Uuid::parse_str(reference)
        .map(OrderId::from_uuid)
        .map_err(|_| SettlementError::BadOrderReference(reference.to_string()))
}

fn target_status(status: &str) -> Result<OrderStatus, SettlementError> {
    match status.to_ascii_lowercase().as_str() {
        "processing" | "pending" => Ok(OrderStatus::Processing),
        "paid" | "succeeded" | "success" => Ok(OrderStatus::Paid),
        "failed" | "failure" => Ok(OrderStatus::Failed),
        "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
        "refunded" => Ok(OrderStatus::Refunded),
        other => Err(SettlementError::UnsupportedStatus(other.to_string())),
    }
}
