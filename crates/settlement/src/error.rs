//! Settlement error types.
//!
//! These cover payload validation only, and validation runs before
//! the dedupe key is reserved. Failures after the key is reserved are
//! never surfaced as errors; they resolve to an unapplied
//! [`SettlementResult`](crate::SettlementResult) and a reconciliation
//! flag, so provider redelivery stays a no-op.

use thiserror::Error;

/// Errors raised while validating an inbound provider event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    /// The event payload carries no order reference.
    #[error("event has no order reference")]
    MissingOrderReference,

    /// The order reference is not a valid order id.
    #[error("order reference is not a valid order id: {0}")]
    BadOrderReference(String),

    /// The provider status does not map to any order status.
    #[error("unsupported payment status: {0}")]
    UnsupportedStatus(String),
}

/// Result type for settlement operations.
pub type Result<T> = std::result::Result<T, SettlementError>;
