//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// The acting user could not be resolved from the request.
    Unauthorized(String),
    /// Order placement error.
    Checkout(CheckoutError),
    /// Storage layer error.
    Store(StoreError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Checkout(err) => return checkout_error_response(err),
            ApiError::Store(err) => return store_error_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn checkout_error_response(err: CheckoutError) -> Response {
    match err {
        // Names the offending line so the client can adjust the cart
        // and retry.
        CheckoutError::InsufficientStock { ref product_id } => {
            let body = serde_json::json!({ "error": err.to_string(), "product_id": product_id });
            (StatusCode::CONFLICT, axum::Json(body)).into_response()
        }
        CheckoutError::ProductUnavailable { .. } => {
            let body = serde_json::json!({ "error": err.to_string() });
            (StatusCode::CONFLICT, axum::Json(body)).into_response()
        }
        CheckoutError::EmptyCart
        | CheckoutError::UnknownProduct { .. }
        | CheckoutError::InvalidQuantity { .. } => {
            let body = serde_json::json!({ "error": err.to_string() });
            (StatusCode::BAD_REQUEST, axum::Json(body)).into_response()
        }
        CheckoutError::Store(inner) => store_error_response(inner),
    }
}

fn store_error_response(err: StoreError) -> Response {
    let (status, message) = match &err {
        StoreError::ProductNotFound(_)
        | StoreError::OrderNotFound(_)
        | StoreError::CartItemNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        StoreError::InsufficientStock { .. } | StoreError::Order(_) => {
            (StatusCode::CONFLICT, err.to_string())
        }
        _ => {
            tracing::error!(error = %err, "storage failure");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    };

    let body = serde_json::json!({ "error": message });
    (status, axum::Json(body)).into_response()
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}
