//! Checkout endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::routes::orders::OrderResponse;
use crate::{AppState, Backend};

/// POST /checkout — place an order from the acting user's cart.
///
/// A rejection leaves the cart and stock untouched; a timed-out call
/// is of unknown outcome and the client should re-read its orders and
/// cart before resubmitting.
#[tracing::instrument(skip(state))]
pub async fn place<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user_id): AuthUser,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = state.coordinator.place_order(user_id).await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}
