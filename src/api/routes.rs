//! API Routes
//!
//! Configures the Axum router with all cache endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_all_handler, clear_namespace_handler, export_handler, flush_handler, get_handler,
    health_handler, import_handler, lookup_handler, remove_handler, set_handler, stats_handler,
    store_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET|PUT|DELETE /cache/:namespace/:key` - Literal-key get, set, remove
/// - `POST /cache/:namespace` - Store under a structured key
/// - `DELETE /cache/:namespace` - Clear one namespace
/// - `DELETE /cache` - Clear every namespace
/// - `POST /lookup/:namespace` - Get by structured key
/// - `GET /stats` - Statistics report
/// - `GET /export`, `POST /import` - Bulk export and import
/// - `POST /flush` - Save persistent namespaces
/// - `GET /health` - Health check
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/cache/:namespace/:key",
            get(get_handler).put(set_handler).delete(remove_handler),
        )
        .route(
            "/cache/:namespace",
            post(store_handler).delete(clear_namespace_handler),
        )
        .route("/cache", axum::routing::delete(clear_all_handler))
        .route("/lookup/:namespace", post(lookup_handler))
        .route("/stats", get(stats_handler))
        .route("/export", get(export_handler))
        .route("/import", post(import_handler))
        .route("/flush", post(flush_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
