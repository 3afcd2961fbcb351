//! Domain error types.

use thiserror::Error;

use crate::order::OrderStatus;

/// Errors raised by the order state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The requested status change is not an edge of the state machine.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// A status string did not name a known order status.
    #[error("unknown order status: {0}")]
    UnknownStatus(String),
}
