//! HTTP API server for checkout and payment settlement.
//!
//! Wires the placement coordinator, the settlement handler, and a
//! storage backend into an axum router, with structured logging
//! (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{delete, get, post, put};
use checkout::{InMemoryCatalog, PlacementCoordinator};
use metrics_exporter_prometheus::PrometheusHandle;
use settlement::{LogNotifier, SettlementHandler};
use store::{CartStore, InventoryLedger, OrderStore, TtlStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Everything the handlers need from one storage backend.
pub trait Backend:
    CartStore + InventoryLedger + OrderStore + TtlStore + Clone + Send + Sync + 'static
{
}

impl<T> Backend for T where
    T: CartStore + InventoryLedger + OrderStore + TtlStore + Clone + Send + Sync + 'static
{
}

/// Shared application state accessible from all handlers.
pub struct AppState<S: Backend> {
    pub store: S,
    pub catalog: InMemoryCatalog,
    pub coordinator: PlacementCoordinator<S, S, S, InMemoryCatalog>,
    pub settlement: SettlementHandler<S, S, LogNotifier>,
}

/// Creates application state over a single backend serving all four
/// persistence roles.
///
/// The catalog is the in-memory stand-in for the external catalog
/// service; the caller seeds it (or the admin route does).
pub fn create_state<S: Backend>(
    store: S,
    catalog: InMemoryCatalog,
    dedupe_ttl: Duration,
) -> Arc<AppState<S>> {
    let coordinator = PlacementCoordinator::new(
        store.clone(),
        store.clone(),
        store.clone(),
        catalog.clone(),
    );
    let settlement =
        SettlementHandler::new(store.clone(), store.clone(), LogNotifier).with_dedupe_ttl(dedupe_ttl);

    Arc::new(AppState {
        store,
        catalog,
        coordinator,
        settlement,
    })
}

/// Creates the axum application router with all routes and shared state.
pub fn create_app<S: Backend>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/cart/items", get(routes::cart::list::<S>))
        .route("/cart/items", post(routes::cart::add_item::<S>))
        .route(
            "/cart/items/{product_id}",
            put(routes::cart::set_quantity::<S>),
        )
        .route(
            "/cart/items/{product_id}",
            delete(routes::cart::remove_item::<S>),
        )
        .route("/checkout", post(routes::checkout::place::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/catalog/products", post(routes::catalog::upsert::<S>))
        .route("/inventory/{product_id}", get(routes::inventory::get::<S>))
        .route(
            "/inventory/{product_id}/restock",
            post(routes::inventory::restock::<S>),
        )
        .route(
            "/webhooks/payment/{provider}",
            post(routes::webhooks::payment::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
