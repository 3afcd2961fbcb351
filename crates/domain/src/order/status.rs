//! Order status state machine.

use serde::{Deserialize, Serialize};

use crate::error::OrderError;

/// The status of an order in its lifecycle.
///
/// Status transitions:
/// ```text
/// Pending ──┬──► Processing ──┬──► Paid ──┬──► Shipped ──► Delivered
///           │                 ├──► Failed └──► Refunded
///           └─────────────────┴──► Cancelled
/// ```
///
/// Delivered, Cancelled, Refunded, and Failed are terminal; no edge
/// leaves them. Cancellation is only reachable from Pending and
/// Processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order persisted, awaiting payment.
    #[default]
    Pending,

    /// Payment seen by the provider, not yet settled.
    Processing,

    /// Payment settled (funds captured).
    Paid,

    /// Order handed to fulfilment.
    Shipped,

    /// Order received by the customer (terminal state).
    Delivered,

    /// Order cancelled before payment settled (terminal state).
    Cancelled,

    /// Payment returned after settling (terminal state).
    Refunded,

    /// Payment failed at the provider (terminal state).
    Failed,
}

impl OrderStatus {
    /// Returns true if the state machine has an edge from `self` to `to`.
    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, to),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Paid)
                | (Processing, Failed)
                | (Processing, Cancelled)
                | (Paid, Shipped)
                | (Paid, Refunded)
                | (Shipped, Delivered)
        )
    }

    /// Validates an edge, returning the target status or a rejection.
    pub fn transition_to(&self, to: OrderStatus) -> Result<OrderStatus, OrderError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(OrderError::InvalidTransition { from: *self, to })
        }
    }

    /// Returns true if the order can be cancelled in this status.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Processing)
    }

    /// Returns true if this is a terminal status (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered
                | OrderStatus::Cancelled
                | OrderStatus::Refunded
                | OrderStatus::Failed
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Processing => "Processing",
            OrderStatus::Paid => "Paid",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Refunded => "Refunded",
            OrderStatus::Failed => "Failed",
        }
    }

    /// All statuses, for exhaustive table checks.
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Paid,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
        OrderStatus::Failed,
    ];
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| OrderError::UnknownStatus(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn pending_edges() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Paid));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Shipped));
    }

    #[test]
    fn processing_edges() {
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Failed));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Processing.can_transition_to(OrderStatus::Shipped));
    }

    #[test]
    fn paid_edges() {
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Refunded));
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn shipped_edges() {
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Refunded));
    }

    #[test]
    fn every_unlisted_edge_is_rejected() {
        let allowed = [
            (OrderStatus::Pending, OrderStatus::Processing),
            (OrderStatus::Pending, OrderStatus::Cancelled),
            (OrderStatus::Processing, OrderStatus::Paid),
            (OrderStatus::Processing, OrderStatus::Failed),
            (OrderStatus::Processing, OrderStatus::Cancelled),
            (OrderStatus::Paid, OrderStatus::Shipped),
            (OrderStatus::Paid, OrderStatus::Refunded),
            (OrderStatus::Shipped, OrderStatus::Delivered),
        ];

        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                let expected = allowed.contains(&(from, to));
                assert_eq!(
                    from.can_transition_to(to),
                    expected,
                    "edge {from} -> {to}"
                );
                match from.transition_to(to) {
                    Ok(status) => {
                        assert!(expected);
                        assert_eq!(status, to);
                    }
                    Err(OrderError::InvalidTransition { from: f, to: t }) => {
                        assert!(!expected);
                        assert_eq!((f, t), (from, to));
                    }
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }
        }
    }

    #[test]
    fn terminal_statuses_have_no_outgoing_edges() {
        for from in OrderStatus::ALL.into_iter().filter(OrderStatus::is_terminal) {
            for to in OrderStatus::ALL {
                assert!(!from.can_transition_to(to), "edge {from} -> {to}");
            }
        }
    }

    #[test]
    fn delivered_to_pending_is_rejected() {
        let err = OrderStatus::Delivered
            .transition_to(OrderStatus::Pending)
            .unwrap_err();
        assert_eq!(
            err,
            OrderError::InvalidTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Pending,
            }
        );
    }

    #[test]
    fn cancellation_only_from_pending_or_processing() {
        assert!(OrderStatus::Pending.can_cancel());
        assert!(OrderStatus::Processing.can_cancel());
        for status in [
            OrderStatus::Paid,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
            OrderStatus::Failed,
        ] {
            assert!(!status.can_cancel(), "{status} should not be cancellable");
            assert!(!status.can_transition_to(OrderStatus::Cancelled));
        }
    }

    #[test]
    fn from_str_roundtrip() {
        for status in OrderStatus::ALL {
            let parsed: OrderStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
        let parsed: OrderStatus = "paid".parse().unwrap();
        assert_eq!(parsed, OrderStatus::Paid);
        assert!("Settled".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn serialization_roundtrip() {
        let status = OrderStatus::Processing;
        let json = serde_json::to_string(&status).unwrap();
        let deserialized: OrderStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(status, deserialized);
    }
}
