use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::{activity, campaign, handlers, middleware::metrics_middleware, targets, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Campaign
        .route("/campaign/start", post(campaign::start))
        .route("/campaign/stop", post(campaign::stop))
        .route("/campaign/status", get(campaign::get_status))
        .route("/campaign/queue", get(campaign::get_queue))
        .route("/campaign/disposition", post(campaign::record_disposition))
        .route("/campaign/confirm", post(campaign::confirm))
        // Activity log
        .route("/activity", get(activity::query_activity))
        // Targets
        .route("/targets", get(targets::list_targets))
        .route("/targets/{id}", get(targets::get_target))
        // Live campaign progress
        .route("/ws", get(ws::ws_handler));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(metrics_middleware)),
        )
}
