//! The inventory ledger: atomic, race-free stock adjustment.

use async_trait::async_trait;
use common::ProductId;
use domain::InventoryRecord;

use crate::error::Result;

/// Stock adjustment primitives for a single product.
///
/// These two operations are the only way stock moves. The decrement
/// is a single conditional storage operation, linearizable per
/// product at the storage layer; callers racing on the same product
/// are serialized there, not by application locks, and a losing
/// caller fails immediately rather than queueing.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Decrements stock by `amount` only if at least that much is
    /// available, in one atomic storage operation.
    ///
    /// An `amount` of zero is a no-op success. Fails with
    /// [`StoreError::InsufficientStock`](crate::StoreError::InsufficientStock)
    /// when the predicate does not hold and
    /// [`StoreError::ProductNotFound`](crate::StoreError::ProductNotFound)
    /// when no record exists.
    async fn conditional_decrement(&self, product_id: &ProductId, amount: u32) -> Result<()>;

    /// Unconditionally adds stock, creating the record when absent.
    ///
    /// Used for restock and for compensating a reservation.
    async fn increment(&self, product_id: &ProductId, amount: u32) -> Result<()>;

    /// Reads the current stock record for a product.
    async fn stock_of(&self, product_id: &ProductId) -> Result<Option<InventoryRecord>>;
}
