//! Catalog stand-in administration.
//!
//! The real catalog lives in a separate service; checkout reads only
//! price and availability through the `CatalogService` seam. This
//! endpoint feeds the in-memory stand-in wired into the binary so a
//! deployment without that service stays operable.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::{Money, ProductId};
use serde::Deserialize;

use crate::{AppState, Backend};

#[derive(Deserialize)]
pub struct UpsertProductRequest {
    pub product_id: String,
    pub price_cents: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// POST /catalog/products — add or replace a catalog entry.
#[tracing::instrument(skip(state, req))]
pub async fn upsert<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<UpsertProductRequest>,
) -> StatusCode {
    let product_id = ProductId::new(req.product_id);
    state
        .catalog
        .insert(product_id.clone(), Money::from_cents(req.price_cents));
    if !req.is_active {
        state.catalog.deactivate(&product_id);
    }
    StatusCode::NO_CONTENT
}
