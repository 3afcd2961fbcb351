//! Inventory stock records.

use common::ProductId;
use serde::{Deserialize, Serialize};

/// Stock on hand for a single product.
///
/// `stock_quantity` never goes negative; the storage layer enforces
/// this, and all mutation goes through the ledger's conditional
/// decrement and increment primitives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub product_id: ProductId,
    pub stock_quantity: u32,
}
