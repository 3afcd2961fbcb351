//! Health and readiness endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::{AppState, Backend};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub dedupe_store: &'static str,
}

/// GET /health — liveness plus a probe of the dedupe keystore.
///
/// A degraded keystore does not fail the check: the idempotency guard
/// fails open and the service keeps serving, so the probe result is
/// surfaced for operators instead of taking the instance out of
/// rotation.
pub async fn check<S: Backend>(State(state): State<Arc<AppState<S>>>) -> Json<HealthResponse> {
    let dedupe_store = match state.store.get("healthz").await {
        Ok(_) => "ok",
        Err(_) => "degraded",
    };

    Json(HealthResponse {
        status: "ok",
        dedupe_store,
    })
}
