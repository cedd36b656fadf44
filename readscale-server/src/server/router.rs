use super::handlers::{self, AppState};
use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

/// Create the Axum router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Cache counters
        .route("/stats", get(handlers::cache_stats))
        // Reads go through the cache and replicas, writes to the primary
        .route(
            "/records/{collection}",
            get(handlers::list_records).post(handlers::create_record),
        )
        .route(
            "/records/{collection}/{id}",
            get(handlers::get_record)
                .put(handlers::update_record)
                .delete(handlers::delete_record),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
