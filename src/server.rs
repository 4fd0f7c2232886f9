use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Dashboard page
        .route("/", get(crate::routes::dashboard::index))
        // Health
        .route("/health", get(crate::routes::health::health))
        // Test runs
        .route("/api/test-runs", get(crate::routes::test_runs::list_runs))
        .route("/api/test-runs/{id}", get(crate::routes::test_runs::get_run))
        .route(
            "/api/test-runs/{id}/results",
            get(crate::routes::test_runs::run_results),
        )
        .route(
            "/api/failed-tests",
            get(crate::routes::test_runs::failed_tests),
        )
        // Aggregates
        .route(
            "/api/statistics",
            get(crate::routes::statistics::statistics),
        )
        .route(
            "/api/coverage-history",
            get(crate::routes::statistics::coverage_history),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
