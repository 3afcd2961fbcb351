//! Checkout error types.

use common::ProductId;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during order placement.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The user's cart has no items.
    #[error("cart is empty")]
    EmptyCart,

    /// Stock ran out for a product; names the offending line so the
    /// client can adjust and retry.
    #[error("insufficient stock for product {product_id}")]
    InsufficientStock { product_id: ProductId },

    /// The product exists but is not currently purchasable.
    #[error("product {product_id} is not available for purchase")]
    ProductUnavailable { product_id: ProductId },

    /// The cart references a product the catalog does not know.
    #[error("unknown product in cart: {product_id}")]
    UnknownProduct { product_id: ProductId },

    /// A cart line has a non-positive quantity.
    #[error("invalid quantity for product {product_id}")]
    InvalidQuantity { product_id: ProductId },

    /// Storage error; the caller may retry with backoff after
    /// re-reading cart and order state.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl CheckoutError {
    /// Returns true for rejections caused by the request itself, as
    /// opposed to infrastructure failures.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, CheckoutError::Store(_))
    }
}

/// Result type for checkout operations.
pub type Result<T> = std::result::Result<T, CheckoutError>;
