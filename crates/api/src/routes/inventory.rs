//! Inventory read and restock endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::{AppState, Backend};

#[derive(Deserialize)]
pub struct RestockRequest {
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct StockResponse {
    pub product_id: String,
    pub stock_quantity: u32,
}

/// GET /inventory/{product_id} — current stock level.
#[tracing::instrument(skip(state))]
pub async fn get<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Path(product_id): Path<String>,
) -> Result<Json<StockResponse>, ApiError> {
    let product_id = ProductId::new(product_id);
    let record = state
        .store
        .stock_of(&product_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("product {product_id} not found")))?;

    Ok(Json(StockResponse {
        product_id: record.product_id.to_string(),
        stock_quantity: record.stock_quantity,
    }))
}

/// POST /inventory/{product_id}/restock — unconditional stock
/// increase, creating the record when absent.
#[tracing::instrument(skip(state, req))]
pub async fn restock<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Path(product_id): Path<String>,
    Json(req): Json<RestockRequest>,
) -> Result<Json<StockResponse>, ApiError> {
    let product_id = ProductId::new(product_id);
    state.store.increment(&product_id, req.quantity).await?;

    let record = state
        .store
        .stock_of(&product_id)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("stock record missing after restock of {product_id}")))?;

    Ok(Json(StockResponse {
        product_id: record.product_id.to_string(),
        stock_quantity: record.stock_quantity,
    }))
}
