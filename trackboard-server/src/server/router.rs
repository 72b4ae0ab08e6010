use super::handlers::{self, AppState};
use super::metrics_handler::metrics_handler;
use crate::auth::{self, BearerAuth};
use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use trackboard_core::{Fetcher, Item};

/// Create the Axum router with all endpoints
pub fn create_router<F>(state: AppState<F>, bearer: BearerAuth) -> Router
where
    F: Fetcher<Output = Vec<Item>>,
{
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let chart = Router::new()
        .route("/api/v1/chart", get(handlers::get_chart::<F>))
        .route("/api/v1/chart/status", get(handlers::get_status::<F>))
        .route("/api/v1/chart/refresh", post(handlers::post_refresh::<F>))
        // Rejects before any handler, and so before the orchestrator
        .route_layer(middleware::from_fn_with_state(bearer, auth::layer));

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(metrics_handler))
        .merge(chart)
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
