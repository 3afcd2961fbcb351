//! Payment settlement.
//!
//! Consumes inbound payment-provider notifications and applies each
//! one to its order at most once. Deliveries are deduplicated by a
//! reserved idempotency key before any mutation; redeliveries — which
//! providers send freely on timeouts — are answered as already
//! processed without touching the order or re-firing notifications.

pub mod error;
pub mod event;
pub mod handler;
pub mod notify;

pub use error::{Result, SettlementError};
pub use event::{PaymentEvent, PaymentEventData, SettlementResult};
pub use handler::{DEFAULT_DEDUPE_TTL, SettlementHandler};
pub use notify::{CountingNotifier, LogNotifier, NotificationService};
