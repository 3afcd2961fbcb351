//! Wire types for inbound provider events.

use serde::{Deserialize, Serialize};

/// Body of an inbound payment-provider notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    /// The provider's unique id for this event. Dedupe hangs off this
    /// id; an event delivered without one is processed best-effort.
    pub provider_event_id: Option<String>,

    /// Provider event type, e.g. `payment.succeeded`.
    #[serde(rename = "type")]
    pub event_type: String,

    pub data: PaymentEventData,
}

/// Event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEventData {
    /// The order the event settles, as the provider echoes it back.
    pub order_reference: String,

    /// Provider-side payment status, e.g. `paid`, `failed`.
    pub status: String,
}

/// Outcome of handling a delivery.
///
/// Every variant maps to an HTTP 200 so the provider stops retrying;
/// non-2xx responses are reserved for transport failures outside the
/// handler, where provider redelivery is wanted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SettlementResult {
    pub success: bool,
    pub already_processed: bool,
}

impl SettlementResult {
    /// The event was applied by this delivery.
    pub fn applied() -> Self {
        Self {
            success: true,
            already_processed: false,
        }
    }

    /// A previous delivery already consumed this event.
    pub fn duplicate() -> Self {
        Self {
            success: true,
            already_processed: true,
        }
    }

    /// The event was recorded but could not be applied; flagged for
    /// reconciliation.
    pub fn unapplied() -> Self {
        Self {
            success: false,
            already_processed: false,
        }
    }
}
