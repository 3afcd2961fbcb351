use common::{OrderId, ProductId};
use domain::OrderError;
use thiserror::Error;

/// Errors that can occur when interacting with the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A conditional decrement found less stock than requested.
    #[error("insufficient stock for product {product_id}")]
    InsufficientStock { product_id: ProductId },

    /// The inventory record does not exist.
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// The order does not exist.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// The cart has no row for the product.
    #[error("cart item not found: {0}")]
    CartItemNotFound(ProductId),

    /// The order state machine rejected the change.
    #[error("order error: {0}")]
    Order(#[from] OrderError),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing store could not be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Returns true if the operation may succeed when retried, as
    /// opposed to a rejection that will repeat deterministically.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Database(_) | StoreError::Migration(_) | StoreError::Unavailable(_)
        )
    }
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
