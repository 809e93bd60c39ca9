//! HTTP API server for the order fulfillment core.
//!
//! Exposes cart intake, checkout, order listings and item tracking as
//! REST endpoints, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::{
    CartService, EligibilityGate, ExpiringUrlSigner, OrderService, StoreCatalog, TrackingService,
};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/cart/items", post(routes::cart::add_item::<S>))
        .route("/orders", post(routes::orders::create::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route(
            "/orders/cod-eligibility",
            get(routes::orders::cod_eligibility::<S>),
        )
        .route("/merchant/orders", get(routes::merchant::list::<S>))
        .route(
            "/order-items/{id}/advance",
            post(routes::tracking::advance::<S>),
        )
        .route(
            "/order-items/{id}/tracking",
            get(routes::tracking::history::<S>),
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

/// Wires the services over `store` using the settings in `config`.
pub fn create_default_state<S: Store + Clone + 'static>(
    store: S,
    config: &Config,
) -> Arc<AppState<S>> {
    let signer = Arc::new(ExpiringUrlSigner::new(config.image_url_base.clone()));

    let order_service = OrderService::new(store.clone(), signer)
        .with_eligibility(EligibilityGate::with_threshold(
            store.clone(),
            config.cod_min_prior_orders,
        ))
        .with_image_url_ttl(config.image_url_ttl);
    let tracking_service = TrackingService::new(store.clone());
    let cart_service = CartService::new(store.clone(), StoreCatalog::new(store))
        .with_timeout(config.collaborator_timeout);

    Arc::new(AppState {
        order_service,
        tracking_service,
        cart_service,
    })
}
