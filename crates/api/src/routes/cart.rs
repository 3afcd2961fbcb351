//! Cart CRUD endpoints for the acting user.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Money, ProductId};
use domain::CartItem;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::{AppState, Backend};

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    pub quantity: u32,
    /// Optional price snapshot; checkout resolves the catalog price
    /// when absent.
    pub unit_price_cents: Option<i64>,
}

#[derive(Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct CartItemResponse {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: Option<i64>,
}

impl From<&CartItem> for CartItemResponse {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product_id.to_string(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price.map(|price| price.cents()),
        }
    }
}

/// POST /cart/items — add a product to the cart, accumulating quantity
/// if the product is already present.
#[tracing::instrument(skip(state, req))]
pub async fn add_item<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<CartItemResponse>), ApiError> {
    if req.quantity == 0 {
        return Err(ApiError::BadRequest("quantity must be positive".to_string()));
    }

    let item = state
        .store
        .add_item(
            user_id,
            &ProductId::new(req.product_id),
            req.quantity,
            req.unit_price_cents.map(Money::from_cents),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(CartItemResponse::from(&item))))
}

/// GET /cart/items — the cart contents in insertion order.
#[tracing::instrument(skip(state))]
pub async fn list<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<CartItemResponse>>, ApiError> {
    let items = state.store.items_for_user(user_id).await?;
    Ok(Json(items.iter().map(CartItemResponse::from).collect()))
}

/// PUT /cart/items/{product_id} — replace a line's quantity; zero
/// removes the line.
#[tracing::instrument(skip(state, req))]
pub async fn set_quantity<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user_id): AuthUser,
    Path(product_id): Path<String>,
    Json(req): Json<SetQuantityRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .store
        .set_quantity(user_id, &ProductId::new(product_id), req.quantity)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /cart/items/{product_id} — drop a line from the cart.
#[tracing::instrument(skip(state))]
pub async fn remove_item<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user_id): AuthUser,
    Path(product_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .store
        .remove_item(user_id, &ProductId::new(product_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
